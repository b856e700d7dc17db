//! Console application
//! Drives the scan/selection loop and connected sessions until the operator leaves.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{SELECTION_HELP, SelectionInput};
use crate::config::ClientConfig;
use crate::console::{Console, InputEvent, LineSource};
use crate::core::bluetooth::{NotificationSink, Transport, spawn_notification_printer};
use crate::core::registry::DeviceRegistry;
use crate::core::session::{Session, SessionOutcome};
use crate::core::SessionError;
use crate::state::SessionState;

/// Prompt shown while choosing a device
pub const SELECTION_PROMPT: &str = "Select device to connect (number): ";

/// How long pending notifications get to reach the console at shutdown
const PRINTER_DRAIN_MS: u64 = 250;

pub struct App<T: Transport, I: LineSource> {
    transport: Arc<T>,
    input: I,
    console: Arc<dyn Console>,
    config: ClientConfig,
    interrupt: CancellationToken,
    registry: DeviceRegistry,
    notifications: NotificationSink,
    printer: JoinHandle<()>,
}

impl<T: Transport, I: LineSource> App<T, I> {
    pub fn new(
        transport: Arc<T>,
        input: I,
        console: Arc<dyn Console>,
        config: ClientConfig,
        interrupt: CancellationToken,
    ) -> Self {
        let (notifications, receiver) = mpsc::unbounded_channel();
        let printer = spawn_notification_printer(receiver, console.clone());

        Self {
            transport,
            input,
            console,
            config,
            interrupt,
            registry: DeviceRegistry::new(),
            notifications,
            printer,
        }
    }

    /// Runs until the operator quits or interrupts
    pub async fn run(mut self) {
        let mut state = SessionState::Scanning;

        loop {
            debug!("Entering state {}", state.name());
            state = match state {
                SessionState::Scanning => self.scan().await,
                SessionState::AwaitingSelection => self.await_selection().await,
                SessionState::Connecting(address) => self.connect(address).await,
                SessionState::Connected(mut session) => {
                    let outcome = session.run(&mut self.input, &self.interrupt).await;
                    SessionState::Disconnecting(session, outcome)
                }
                SessionState::Disconnecting(session, outcome) => {
                    let failures = session.close().await;
                    if !failures.is_empty() {
                        info!("{} subscription(s) could not be cancelled cleanly", failures.len());
                    }
                    match outcome {
                        SessionOutcome::Exit => SessionState::Terminated,
                        SessionOutcome::Rescan | SessionOutcome::ConnectionLost => {
                            SessionState::Scanning
                        }
                    }
                }
                SessionState::Terminated => break,
            };
        }

        let Self {
            notifications,
            printer,
            console,
            ..
        } = self;
        drop(notifications);
        let mut printer = printer;
        if tokio::time::timeout(Duration::from_millis(PRINTER_DRAIN_MS), &mut printer)
            .await
            .is_err()
        {
            printer.abort();
        }
        console.print("Goodbye.");
    }

    async fn scan(&mut self) -> SessionState<T> {
        let duration = self.config.scan_duration();
        self.console.print(&format!(
            "Scanning for nearby BLE devices ({}s)...",
            duration.as_secs()
        ));

        let result = tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => return SessionState::Terminated,
            result = self.registry.scan(self.transport.as_ref(), duration) => result.map(|_| ()),
        };

        match result {
            Ok(()) => self.console.print_all(&self.registry.listing()),
            Err(e) => {
                self.console.print(&format!("[!] {}", e));
                self.console
                    .print("Type 'refresh' to scan again or 'quit' to exit.");
            }
        }
        SessionState::AwaitingSelection
    }

    async fn await_selection(&mut self) -> SessionState<T> {
        loop {
            let line = match self.input.next_line(SELECTION_PROMPT).await {
                InputEvent::Line(line) => line,
                InputEvent::Interrupt | InputEvent::Closed => return SessionState::Terminated,
            };

            match SelectionInput::parse(&line) {
                SelectionInput::Empty => {}
                SelectionInput::Help => {
                    for line in SELECTION_HELP {
                        self.console.print(line);
                    }
                }
                SelectionInput::Quit => return SessionState::Terminated,
                SelectionInput::Refresh => return SessionState::Scanning,
                SelectionInput::Select(index) => match self.registry.resolve(index) {
                    Ok(address) => return SessionState::Connecting(address.to_string()),
                    Err(e) => self.console.print(&format!("[!] {}", e)),
                },
                SelectionInput::Invalid(raw) => {
                    let err = SessionError::InvalidInput(format!(
                        "'{}' is not a device number or command, type 'help' for options",
                        raw
                    ));
                    self.console.print(&format!("[!] {}", err));
                }
            }
        }
    }

    async fn connect(&mut self, address: String) -> SessionState<T> {
        self.console.print(&format!("[*] Connecting to {}...", address));

        let connected = tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => return SessionState::Terminated,
            result = self.transport.connect(&address, self.config.connect_timeout()) => result,
        };

        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                self.console.print(&format!("[!] {}", e));
                self.console.print("[-] Returning to device selection.");
                return SessionState::Scanning;
            }
        };

        let session = Session::open(
            self.transport.clone(),
            connection,
            address.clone(),
            self.notifications.clone(),
            self.console.clone(),
        )
        .await;

        match session {
            Ok(session) => {
                info!("Session established with {}", address);
                self.console.print(&format!("[*] Connected to {}", address));
                session.print_listing();
                self.console
                    .print("Successfully connected. Type 'help' for options.");
                SessionState::Connected(session)
            }
            Err(e) => {
                self.console.print(&format!("[!] {}", e));
                self.console.print("[-] Returning to device selection.");
                SessionState::Scanning
            }
        }
    }
}
