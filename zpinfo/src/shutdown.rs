//! Signal-driven shutdown.
//!
//! The orchestrator owns a [`ShutdownToken`]. Anything holding a
//! [`ShutdownTrigger`] can release it: the OS signal handlers installed by
//! [`OsSignals`], or a test.

use std::fmt;
use std::io;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The two termination signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl Signal {
    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiving end of shutdown requests.
#[derive(Debug)]
pub struct ShutdownToken {
    tx: mpsc::UnboundedSender<Signal>,
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A handle that releases this token.
    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.tx.clone(),
        }
    }

    /// Wait for the next release.
    pub async fn recv(&mut self) -> Signal {
        match self.rx.recv().await {
            Some(signal) => signal,
            // The token holds a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }
}

/// Releases a [`ShutdownToken`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::UnboundedSender<Signal>,
}

impl ShutdownTrigger {
    pub fn release(&self, signal: Signal) {
        // The token is gone once the orchestrator finished.
        let _ = self.tx.send(signal);
    }
}

/// Installs signal delivery for monitor mode.
pub trait SignalSource: Send {
    fn install(&mut self, trigger: ShutdownTrigger) -> io::Result<()>;
}

/// SIGINT and SIGTERM from the operating system.
#[derive(Debug, Default)]
pub struct OsSignals {
    tasks: Vec<JoinHandle<()>>,
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    fn install(&mut self, trigger: ShutdownTrigger) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, sig) in [
            (SignalKind::interrupt(), Signal::Interrupt),
            (SignalKind::terminate(), Signal::Terminate),
        ] {
            let mut stream = signal(kind)?;
            let trigger = trigger.clone();
            self.tasks.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    trigger.release(sig);
                }
            }));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn install(&mut self, trigger: ShutdownTrigger) -> io::Result<()> {
        self.tasks.push(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                trigger.release(Signal::Interrupt);
            }
        }));
        Ok(())
    }
}

impl Drop for OsSignals {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
