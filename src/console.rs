//! Console input and output
//! Operator input is read on a dedicated thread and handed to the async side
//! over a channel, so notifications can be printed while a prompt is waiting.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Output side of the console
pub trait Console: Send + Sync {
    /// Prints one line of regular output
    fn print(&self, line: &str);

    /// Prints a line that arrived asynchronously, keeping any pending prompt usable
    fn interject(&self, line: &str);

    fn print_all(&self, lines: &[String]) {
        for line in lines {
            self.print(line);
        }
    }
}

/// One event from the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    /// Ctrl-C
    Interrupt,
    /// Input stream closed
    Closed,
}

/// Input side of the console
#[async_trait::async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self, prompt: &str) -> InputEvent;
}

/// Console writing to stdout
#[derive(Default)]
pub struct StdConsole {
    /// Prompt currently waiting for input, if any
    pending_prompt: Mutex<Option<String>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self::default()
    }

    fn show_prompt(&self, prompt: &str) {
        if let Ok(mut pending) = self.pending_prompt.lock() {
            let mut stdout = io::stdout().lock();
            let _ = write!(stdout, "{}", prompt);
            let _ = stdout.flush();
            *pending = Some(prompt.to_string());
        }
    }

    fn clear_prompt(&self) {
        if let Ok(mut pending) = self.pending_prompt.lock() {
            *pending = None;
        }
    }

    /// Ends a prompt the operator never submitted, so later output starts on a fresh line
    fn abandon_prompt(&self) {
        if let Ok(mut pending) = self.pending_prompt.lock() {
            if pending.take().is_some() {
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout);
                let _ = stdout.flush();
            }
        }
    }
}

/// Abandons the pending prompt when a read ends without a line, including when it is dropped
struct PromptGuard<'a>(&'a StdConsole);

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        self.0.abandon_prompt();
    }
}

impl Console for StdConsole {
    fn print(&self, line: &str) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }

    fn interject(&self, line: &str) {
        // Holding the lock keeps prompt state and output consistent
        let pending = match self.pending_prompt.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut stdout = io::stdout().lock();
        match pending.as_deref() {
            Some(prompt) => {
                // Erase the prompt line, print, then redraw the prompt
                let _ = write!(stdout, "\r\x1b[2K{}\n{}", line, prompt);
            }
            None => {
                let _ = writeln!(stdout, "{}", line);
            }
        }
        let _ = stdout.flush();
    }
}

/// Cancels the returned token on the first Ctrl-C.
///
/// The watcher lives for the whole process so an interrupt is never missed,
/// whether it arrives at a prompt or during a transport round-trip.
pub fn watch_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let token_for_task = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                token_for_task.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
    token
}

/// Reads operator lines from stdin
pub struct StdinSource {
    console: Arc<StdConsole>,
    lines: mpsc::Receiver<String>,
    interrupt: CancellationToken,
}

impl StdinSource {
    pub fn new(console: Arc<StdConsole>, interrupt: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(32);

        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
            info!("Stdin reader thread finished.");
        });

        Self {
            console,
            lines: rx,
            interrupt,
        }
    }
}

#[async_trait::async_trait]
impl LineSource for StdinSource {
    async fn next_line(&mut self, prompt: &str) -> InputEvent {
        self.console.show_prompt(prompt);
        let _prompt = PromptGuard(&self.console);

        let event = tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => InputEvent::Interrupt,
            line = self.lines.recv() => match line {
                Some(line) => InputEvent::Line(line),
                None => InputEvent::Closed,
            },
        };

        if let InputEvent::Line(_) = event {
            self.console.clear_prompt();
        }
        event
    }
}
