//! Sync controller
//!
//! Drives the reconciliation engine on a fixed interval. Runs as a tokio
//! event loop that also accepts commands and, on Unix, stops on
//! SIGTERM/SIGINT.
//!
//! A tick is awaited inside the loop, so ticks never overlap: interval
//! ticks missed while one is running are dropped, and commands and stop
//! requests are only looked at between ticks.

use crate::engine::{ReconciliationEngine, TickSummary};
use crate::metrics;
use crate::{Result, RosterError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Default tick interval (10 seconds)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Time between tick starts
    pub tick_interval: Duration,

    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,

    /// Stop on SIGTERM/SIGINT (Unix only)
    pub handle_signals: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            handle_signals: true,
        }
    }
}

impl ControllerConfig {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            ..Default::default()
        }
    }

    pub fn with_signals(mut self, handle_signals: bool) -> Self {
        self.handle_signals = handle_signals;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Started,

    TickStarted,

    /// Tick ran; per-target failures are counted in the summary
    TickCompleted(TickSummary),

    /// Tick did nothing because the roster or the target list was unavailable
    TickAborted { reason: String },

    Stopped,
}

/// Commands accepted by a running controller
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Run a tick now
    SyncNow,

    /// Change the tick interval; the next tick is one new interval away
    SetInterval(Duration),

    /// Stop after the current tick
    Shutdown,
}

enum CommandResult {
    Continue,
    Stop,
}

/// Cloneable handle for talking to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    async fn send(&self, command: ControllerCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RosterError::Other("controller is not running".to_string()))
    }

    pub async fn sync_now(&self) -> Result<()> {
        self.send(ControllerCommand::SyncNow).await
    }

    pub async fn set_interval(&self, interval: Duration) -> Result<()> {
        self.send(ControllerCommand::SetInterval(interval)).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(ControllerCommand::Shutdown).await
    }
}

/// Periodic driver of the reconciliation engine
pub struct SyncController {
    engine: Arc<ReconciliationEngine>,
    config: ControllerConfig,
    event_tx: broadcast::Sender<ControllerEvent>,
    command_rx: Option<mpsc::Receiver<ControllerCommand>>,
    command_tx: mpsc::Sender<ControllerCommand>,
}

impl SyncController {
    pub fn new(engine: Arc<ReconciliationEngine>, config: ControllerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(16);

        Self {
            engine,
            config,
            event_tx,
            command_rx: Some(command_rx),
            command_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.command_tx.clone(),
        }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Send an event; nobody listening is fine
    fn send_event(&self, event: ControllerEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    fn interval(period: Duration, start: Instant) -> Interval {
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// Run until stopped
    ///
    /// The first tick starts immediately. Can only be called once.
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| RosterError::Config("Controller already running".to_string()))?;

        tracing::info!(
            interval_secs = self.config.tick_interval.as_secs_f64(),
            "Sync controller started"
        );
        self.send_event(ControllerEvent::Started);

        let mut interval = Self::interval(self.config.tick_interval, Instant::now());

        #[cfg(unix)]
        {
            if self.config.handle_signals {
                self.run_with_signals(&mut interval, &mut command_rx).await?;
            } else {
                self.run_without_signals(&mut interval, &mut command_rx)
                    .await;
            }
        }

        #[cfg(not(unix))]
        {
            self.run_without_signals(&mut interval, &mut command_rx)
                .await;
        }

        metrics::set_health_status(false);
        tracing::info!("Sync controller stopped");
        self.send_event(ControllerEvent::Stopped);
        Ok(())
    }

    #[cfg(unix)]
    async fn run_with_signals(
        &mut self,
        interval: &mut Interval,
        command_rx: &mut mpsc::Receiver<ControllerCommand>,
    ) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            RosterError::Other(format!("Failed to set up SIGTERM handler: {}", e))
        })?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
            RosterError::Other(format!("Failed to set up SIGINT handler: {}", e))
        })?;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, interval).await {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn run_without_signals(
        &mut self,
        interval: &mut Interval,
        command_rx: &mut mpsc::Receiver<ControllerCommand>,
    ) {
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                cmd = command_rx.recv() => {
                    // The controller holds a sender, so `None` never happens
                    let Some(cmd) = cmd else { break };
                    match self.handle_command(cmd, interval).await {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        cmd: ControllerCommand,
        interval: &mut Interval,
    ) -> CommandResult {
        match cmd {
            ControllerCommand::SyncNow => {
                self.tick_once().await;
            }
            ControllerCommand::SetInterval(duration) => {
                if duration.is_zero() {
                    tracing::warn!("Ignoring zero tick interval");
                } else {
                    tracing::info!(interval_secs = duration.as_secs_f64(), "Tick interval changed");
                    *interval = Self::interval(duration, Instant::now() + duration);
                    self.config.tick_interval = duration;
                }
            }
            ControllerCommand::Shutdown => {
                tracing::info!("Received shutdown command");
                return CommandResult::Stop;
            }
        }
        CommandResult::Continue
    }

    async fn tick_once(&self) {
        self.send_event(ControllerEvent::TickStarted);
        match self.engine.tick().await {
            Ok(report) => {
                self.send_event(ControllerEvent::TickCompleted(report.summary()));
            }
            Err(e) => {
                self.send_event(ControllerEvent::TickAborted {
                    reason: e.to_string(),
                });
            }
        }
    }
}
