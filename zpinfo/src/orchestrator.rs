//! Mode dispatch and the monitor lifecycle.
//!
//! ```text
//! Starting ──(query)──────────────────────────────────────► Terminated
//! Starting ──► Listening ──► Running ──► ShuttingDown ────► Terminated
//! ```
//!
//! The description is fetched in `Starting` in both modes, so an
//! unreachable device fails before any listener exists. In `Running` one
//! loop handles signals and notices one at a time, signals first.

use std::io::Write;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Mode, MonitorConfig, Options};
use crate::device::{close_within, DeviceClient, EventListener, Notice};
use crate::error::Error;
use crate::fetcher;
use crate::format::JsonFormatter;
use crate::shutdown::{ShutdownToken, ShutdownTrigger, Signal, SignalSource};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Starting,
    Listening,
    Running,
    ShuttingDown,
    Terminated,
}

/// Runs zpinfo once against one device.
pub struct Orchestrator<C, S> {
    options: Options,
    monitor: MonitorConfig,
    formatter: JsonFormatter,
    client: C,
    signals: S,
    shutdown: ShutdownToken,
    state: State,
}

impl<C, S> Orchestrator<C, S>
where
    C: DeviceClient,
    S: SignalSource,
{
    pub fn new(options: Options, monitor: MonitorConfig, client: C, signals: S) -> Self {
        Self {
            formatter: JsonFormatter::new(options.no_white_space),
            options,
            monitor,
            client,
            signals,
            shutdown: ShutdownToken::new(),
            state: State::Starting,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Releases a running monitor, the same way a signal does.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.trigger()
    }

    /// Run to completion. Query output is written to `out`.
    ///
    /// Always ends in [`State::Terminated`].
    ///
    /// # Errors
    ///
    /// Failures while starting (fetch, enrichment, listener, subscription)
    /// and a failed close at shutdown. Errors reported while running are
    /// logged instead.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> Result<(), Error> {
        let result = self.dispatch(out).await;
        self.state = State::Terminated;
        result
    }

    async fn dispatch<W: Write>(&mut self, out: &mut W) -> Result<(), Error> {
        self.state = State::Starting;
        let description = fetcher::fetch_description(&mut self.client).await?;

        match self.options.mode {
            None => self.query(description, out).await,
            Some(mode) => self.monitor(mode).await,
        }
    }

    async fn query<W: Write>(
        &mut self,
        mut description: zp_client::DeviceDescription,
        out: &mut W,
    ) -> Result<(), Error> {
        if self.options.scdp {
            let fetched = fetcher::enrich(&mut self.client, &mut description).await?;
            debug!(fetched, "service definitions attached");
        }

        let text = self.formatter.format(&description)?;
        writeln!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }

    async fn monitor(&mut self, mode: Mode) -> Result<(), Error> {
        debug!(?mode, "starting monitor");
        self.signals
            .install(self.shutdown.trigger())
            .map_err(Error::Signals)?;

        let (notices_tx, mut notices) = mpsc::unbounded_channel();
        let mut listener = self.client.listener();
        let url = listener.start(notices_tx.clone()).await?;
        info!("listening on {url}");
        self.state = State::Listening;

        if let Err(e) = self.client.open(&mut listener, notices_tx).await {
            listener.stop().await;
            return Err(e);
        }
        self.state = State::Running;

        let address = self.client.address().to_string();
        let formatter = self.formatter;
        let signal = loop {
            tokio::select! {
                biased;
                signal = self.shutdown.recv() => break signal,
                Some(notice) = notices.recv() => log_notice(&address, formatter, notice),
            }
        };

        let result = self.shut_down(signal).await;
        listener.stop().await;
        result
    }

    /// Close the subscription once, ignoring signals that arrive meanwhile.
    async fn shut_down(&mut self, signal: Signal) -> Result<(), Error> {
        info!("got {signal}, shutting down");
        self.state = State::ShuttingDown;

        let close = close_within(&mut self.client, self.monitor.close_timeout);
        tokio::pin!(close);

        let result = loop {
            tokio::select! {
                biased;
                result = &mut close => break result,
                again = self.shutdown.recv() => {
                    warn!("got {again} while shutting down, ignoring");
                }
            }
        };

        if result.is_ok() {
            info!("subscription closed");
        }
        result
    }
}

fn log_notice(address: &str, formatter: JsonFormatter, notice: Notice) {
    match notice {
        Notice::Event(event) => match formatter.format(&event.payload) {
            Ok(json) => info!("{address}: {} {} event: {json}", event.device, event.service),
            Err(e) => error!("{address}: {} {} event: {e}", event.device, event.service),
        },
        Notice::ListenerError(e) => error!("listener: {e}"),
        Notice::ClientError(e) => error!("{address}: {e}"),
    }
}
