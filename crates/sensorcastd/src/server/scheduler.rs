//! Per-connection emission scheduler.
//!
//! Life cycle: `Idle → Running → Stopped`. `Stopped` is terminal.
//!
//! The scheduler owns the connection's periodic timer. Its first tick fires
//! one full interval after [`EmissionScheduler::start`]; missed ticks are
//! delayed rather than bursted.

use std::future;

use rand::Rng;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use sensorcast_core::{ConnectionConfig, ReadingGenerator};
use sensorcast_protocol::{ServerMessage, TelemetryMessage};

/// State of an [`EmissionScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Emits telemetry for one connection at its negotiated cadence.
#[derive(Debug)]
pub struct EmissionScheduler {
    config: ConnectionConfig,
    state: SchedulerState,
    timer: Option<Interval>,
}

impl EmissionScheduler {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            timer: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Arms the timer and returns the hello message.
    ///
    /// Returns `None` unless the scheduler is `Idle`.
    pub fn start(&mut self) -> Option<ServerMessage> {
        if self.state != SchedulerState::Idle {
            return None;
        }

        let period = self.config.interval();
        let mut timer = time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.timer = Some(timer);
        self.state = SchedulerState::Running;
        Some(ServerMessage::hello(&self.config))
    }

    /// Waits for the next emission tick.
    ///
    /// Never completes unless the scheduler is `Running`, so it can sit in a
    /// `select!` for the whole life of the connection. Cancel safe.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) if self.state == SchedulerState::Running => {
                timer.tick().await;
            }
            _ => future::pending::<()>().await,
        }
    }

    /// Builds the messages for one tick: `batch_count` independent draws.
    ///
    /// Empty unless the scheduler is `Running`.
    pub fn emit<R: Rng>(&self, generator: &mut ReadingGenerator<R>) -> Vec<TelemetryMessage> {
        if self.state != SchedulerState::Running {
            return Vec::new();
        }

        (0..self.config.batch_count)
            .filter_map(|_| {
                let readings =
                    generator.draw(&self.config.asset_id, &self.config.channels, self.config.mode);
                TelemetryMessage::from_readings(&self.config.asset_id, readings)
            })
            .collect()
    }

    /// Stops the scheduler and drops its timer.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn stop(&mut self) -> bool {
        if self.state == SchedulerState::Stopped {
            return false;
        }
        self.timer = None;
        self.state = SchedulerState::Stopped;
        true
    }
}
