//! Liveness watchdog for a single connection.
//!
//! Every keepalive period the watchdog either probes the peer or, if the
//! previous probe went unanswered, asks for the connection to be terminated.
//! A connection that misses one full probe cycle is reaped on the next tick.

use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// State of a [`LivenessWatchdog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Running,
    Stopped,
}

/// What the connection should do after a watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Send a ping and wait for the pong.
    Probe,
    /// The last probe went unanswered; hard-close the connection.
    Terminate,
}

#[derive(Debug)]
pub struct LivenessWatchdog {
    period: Duration,
    is_alive: bool,
    state: WatchdogState,
    timer: Option<Interval>,
}

impl LivenessWatchdog {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            is_alive: true,
            state: WatchdogState::Idle,
            timer: None,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    /// Arms the probe timer. The first tick fires one period from now.
    pub fn start(&mut self) -> bool {
        if self.state != WatchdogState::Idle {
            return false;
        }

        let mut timer = time::interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.timer = Some(timer);
        self.is_alive = true;
        self.state = WatchdogState::Running;
        true
    }

    /// Waits for the next probe tick. Pending forever unless `Running`.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) if self.state == WatchdogState::Running => {
                timer.tick().await;
            }
            _ => future::pending::<()>().await,
        }
    }

    /// Decides what a tick means.
    ///
    /// `Terminate` also stops the watchdog.
    pub fn on_tick(&mut self) -> Option<WatchdogAction> {
        if self.state != WatchdogState::Running {
            return None;
        }

        if !self.is_alive {
            self.stop();
            return Some(WatchdogAction::Terminate);
        }

        self.is_alive = false;
        Some(WatchdogAction::Probe)
    }

    /// Records a pong from the peer.
    pub fn acknowledge(&mut self) {
        self.is_alive = true;
    }

    /// Stops the watchdog and drops its timer. `true` only on the first call.
    pub fn stop(&mut self) -> bool {
        if self.state == WatchdogState::Stopped {
            return false;
        }
        self.timer = None;
        self.state = WatchdogState::Stopped;
        true
    }
}
