//! Session controller
//! Owns one live connection together with its characteristic index and the set
//! of subscribed characteristics, dispatches operator commands against it, and
//! always releases every subscription before the connection is dropped.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::commands::{Command, SESSION_HELP};
use crate::console::{Console, InputEvent, LineSource};
use crate::core::bluetooth::{
    Capabilities, LinkEvent, NotificationSink, Transport, TransportError,
};
use crate::core::characteristic_index::CharacteristicIndex;
use crate::core::errors::SessionError;
use crate::utils::render_value;

/// Prompt shown inside a connected session
pub const SESSION_PROMPT: &str = "> ";

/// How a connected session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Operator asked to scan again
    Rescan,
    /// Operator quit, interrupted, or input ended
    Exit,
    /// The link dropped underneath the session
    ConnectionLost,
}

pub struct Session<T: Transport> {
    transport: Arc<T>,
    connection: T::Connection,
    address: String,
    index: CharacteristicIndex,
    subscriptions: BTreeSet<Uuid>,
    notifications: NotificationSink,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    console: Arc<dyn Console>,
}

impl<T: Transport> Session<T> {
    /// Enumerates the connection and builds its characteristic index.
    ///
    /// If enumeration fails the connection is released before the error is returned.
    pub async fn open(
        transport: Arc<T>,
        connection: T::Connection,
        address: String,
        notifications: NotificationSink,
        console: Arc<dyn Console>,
    ) -> Result<Self, TransportError> {
        let services = match transport.enumerate(&connection).await {
            Ok(services) => services,
            Err(e) => {
                if let Err(disconnect_err) = transport.disconnect(connection).await {
                    warn!("Failed to disconnect from {}: {}", address, disconnect_err);
                }
                return Err(e);
            }
        };

        let (events, link_events) = mpsc::unbounded_channel();
        if let Err(e) = transport.watch(&connection, events).await {
            warn!("Link loss on {} will only be noticed on failed operations: {}", address, e);
        }

        let index = CharacteristicIndex::build(services);
        info!(
            "Indexed {} actionable characteristic(s) on {}",
            index.len(),
            address
        );

        Ok(Self {
            transport,
            connection,
            address,
            index,
            subscriptions: BTreeSet::new(),
            notifications,
            link_events,
            console,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn index(&self) -> &CharacteristicIndex {
        &self.index
    }

    pub fn subscriptions(&self) -> &BTreeSet<Uuid> {
        &self.subscriptions
    }

    pub fn print_listing(&self) {
        self.console.print_all(&self.index.listing());
    }

    /// Runs the command loop until the operator leaves or the link drops.
    ///
    /// Subscriptions are still active when this returns; the caller ends the
    /// session with [`Session::close`].
    pub async fn run<I: LineSource>(
        &mut self,
        input: &mut I,
        interrupt: &CancellationToken,
    ) -> SessionOutcome {
        loop {
            let event = {
                let next_line = input.next_line(SESSION_PROMPT);
                tokio::pin!(next_line);
                loop {
                    tokio::select! {
                        biased;
                        Some(link_event) = self.link_events.recv() => {
                            if self.on_link_event(link_event) {
                                return SessionOutcome::ConnectionLost;
                            }
                        }
                        event = &mut next_line => break event,
                    }
                }
            };
            let command = match event {
                InputEvent::Line(line) => Command::parse(&line),
                InputEvent::Interrupt | InputEvent::Closed => return SessionOutcome::Exit,
            };
            debug!("Dispatching {:?}", command);

            let result = tokio::select! {
                biased;
                _ = interrupt.cancelled() => return SessionOutcome::Exit,
                result = self.handle(command) => result,
            };

            match result {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {}
                Err(err) => {
                    self.console.print(&format!("[!] {}", err));
                    if let SessionError::Transport(transport_err) = &err {
                        if transport_err.is_connection_scoped()
                            || !self.transport.is_connected(&self.connection).await
                        {
                            self.report_lost();
                            return SessionOutcome::ConnectionLost;
                        }
                    }
                    if err.wants_listing() {
                        self.print_listing();
                    }
                }
            }
        }
    }

    /// Applies a transport-reported event; true if the link is gone
    fn on_link_event(&mut self, event: LinkEvent) -> bool {
        match event {
            LinkEvent::Disconnected => {
                self.report_lost();
                true
            }
            LinkEvent::SubscriptionEnded(uuid) => {
                if self.subscriptions.remove(&uuid) {
                    warn!("Notifications from {} stopped unexpectedly", uuid);
                    self.console
                        .interject(&format!("[-] Subscription to {} ended.", uuid));
                }
                false
            }
        }
    }

    fn report_lost(&self) {
        warn!("Lost connection to {}", self.address);
        self.console
            .interject(&format!("[-] Connection to {} lost.", self.address));
    }

    /// Executes one command; `Some` means the session should end
    pub async fn handle(&mut self, command: Command) -> Result<Option<SessionOutcome>, SessionError> {
        match command {
            Command::Empty => {}
            Command::Help => {
                for line in SESSION_HELP {
                    self.console.print(line);
                }
            }
            Command::List => self.print_listing(),
            Command::Read(n) => {
                let uuid = self.require(n, "read", |c| c.read)?;
                let value = self.transport.read(&self.connection, uuid).await?;
                self.console
                    .print(&format!("[<] Read from {}: {}", uuid, render_value(&value)));
            }
            Command::Subscribe(n) => {
                let uuid = self.require(n, "notify or indicate", Capabilities::can_subscribe)?;
                self.subscribe(uuid).await?;
            }
            Command::Unsubscribe(n) => {
                let uuid = self.index.get(n)?.uuid;
                self.unsubscribe(uuid).await?;
            }
            Command::Subscriptions => {
                if self.subscriptions.is_empty() {
                    self.console.print("[*] No active subscriptions.");
                } else {
                    for uuid in &self.subscriptions {
                        self.console.print(&format!("[*] Subscribed: {}", uuid));
                    }
                }
            }
            Command::Write(n, data) => {
                let uuid = self.require(n, "write", |c| c.write)?;
                self.transport.write(&self.connection, uuid, &data).await?;
                self.console
                    .print(&format!("[*] Wrote {} byte(s) to {}.", data.len(), uuid));
            }
            Command::Rescan => return Ok(Some(SessionOutcome::Rescan)),
            Command::Exit => return Ok(Some(SessionOutcome::Exit)),
            Command::Invalid(err) => return Err(err.into()),
        }
        Ok(None)
    }

    /// Resolves an operator index and checks the characteristic supports `operation`
    fn require(
        &self,
        n: usize,
        operation: &str,
        supports: impl Fn(&Capabilities) -> bool,
    ) -> Result<Uuid, SessionError> {
        let entry = self.index.get(n)?;
        if supports(&entry.capabilities) {
            Ok(entry.uuid)
        } else {
            Err(SessionError::InvalidArgument(format!(
                "characteristic {} ({}) does not support {}",
                n, entry.uuid, operation
            )))
        }
    }

    async fn subscribe(&mut self, uuid: Uuid) -> Result<(), SessionError> {
        if self.subscriptions.contains(&uuid) {
            self.console
                .print(&format!("[*] Already subscribed to {}.", uuid));
            return Ok(());
        }

        self.transport
            .subscribe(&self.connection, uuid, self.notifications.clone())
            .await?;
        self.subscriptions.insert(uuid);
        self.console.print(&format!("[*] Subscribed to {}.", uuid));
        Ok(())
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), SessionError> {
        if !self.subscriptions.remove(&uuid) {
            self.console.print(&format!("[*] Not subscribed to {}.", uuid));
            return Ok(());
        }

        // The identifier stays out of the set even if the transport refuses
        self.transport.unsubscribe(&self.connection, uuid).await?;
        self.console.print(&format!("[*] Unsubscribed from {}.", uuid));
        Ok(())
    }

    /// Cancels every subscription, best-effort.
    ///
    /// The set is empty afterwards no matter what the transport reports;
    /// individual failures are logged and returned.
    pub async fn unsubscribe_all(&mut self) -> Vec<(Uuid, TransportError)> {
        let pending = std::mem::take(&mut self.subscriptions);
        let mut failures = Vec::new();

        for uuid in pending {
            match self.transport.unsubscribe(&self.connection, uuid).await {
                Ok(()) => debug!("Unsubscribed from {}", uuid),
                Err(e) => {
                    warn!("Failed to unsubscribe from {}: {}", uuid, e);
                    failures.push((uuid, e));
                }
            }
        }
        failures
    }

    /// Releases all subscriptions and disconnects
    pub async fn close(mut self) -> Vec<(Uuid, TransportError)> {
        let failures = self.unsubscribe_all().await;

        let Self {
            transport,
            connection,
            address,
            console,
            ..
        } = self;

        info!("Disconnecting from {}", address);
        if let Err(e) = transport.disconnect(connection).await {
            warn!("Failed to disconnect from {}: {}", address, e);
        }
        console.print(&format!("[*] Disconnected from {}.", address));
        failures
    }
}
