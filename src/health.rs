//! Ping/pong liveness monitoring for an open connection.
//!
//! [`HealthMonitor`] tracks ping cadence and pong deadlines as explicit
//! instants rather than owning timers: the connection actor asks for the
//! next deadline, sleeps until it, and feeds the wake-up back in. This
//! keeps the monitor free of IO and lets tests drive it with a fake clock.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::debug;

/// What the actor must do after a health deadline fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthAction {
    /// Send a ping frame now.
    SendPing,
    /// A pong deadline passed unanswered; treat the connection as dead.
    Unhealthy,
    /// Nothing due yet.
    Idle,
}

/// Deadline-driven ping/pong tracker.
///
/// While running, a ping is due every `ping_interval` and each ping expects
/// a pong within `pong_timeout`. A missed pong raises
/// [`HealthAction::Unhealthy`] exactly once per missed window. Pongs are
/// matched against the nearest outstanding ping; stray or duplicate pongs
/// are ignored.
#[derive(Debug)]
pub struct HealthMonitor {
    ping_interval: Duration,
    pong_timeout: Duration,
    next_ping_at: Option<Instant>,
    pong_deadlines: VecDeque<Instant>,
}

impl HealthMonitor {
    /// Create a stopped monitor.
    ///
    /// `pong_timeout` should be shorter than `ping_interval` so at most one
    /// ping is normally outstanding; the monitor nevertheless tolerates
    /// several.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
            next_ping_at: None,
            pong_deadlines: VecDeque::new(),
        }
    }

    /// Start monitoring; the first ping is due one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_ping_at = Some(now + self.ping_interval);
        self.pong_deadlines.clear();
    }

    /// Stop monitoring and discard every pending deadline.
    pub fn stop(&mut self) {
        self.next_ping_at = None;
        self.pong_deadlines.clear();
    }

    /// Whether the monitor is currently running.
    #[must_use]
    pub const fn is_running(&self) -> bool { self.next_ping_at.is_some() }

    /// The next instant the actor should wake the monitor, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let pong = self.pong_deadlines.front().copied();
        match (self.next_ping_at, pong) {
            (Some(ping), Some(pong)) => Some(ping.min(pong)),
            (ping, pong) => ping.or(pong),
        }
    }

    /// Process a deadline wake-up at `now`.
    ///
    /// Missed pong windows take precedence over sending the next ping. The
    /// actor re-reads [`next_deadline`](Self::next_deadline) after acting,
    /// so overlapping deadlines fire on consecutive wake-ups.
    pub fn on_deadline(&mut self, now: Instant) -> HealthAction {
        if let Some(deadline) = self.pong_deadlines.front().copied()
            && deadline <= now
        {
            self.pong_deadlines.pop_front();
            return HealthAction::Unhealthy;
        }

        match self.next_ping_at {
            Some(due) if due <= now => {
                self.next_ping_at = Some(now + self.ping_interval);
                self.pong_deadlines.push_back(now + self.pong_timeout);
                HealthAction::SendPing
            }
            _ => HealthAction::Idle,
        }
    }

    /// Account a received pong against the nearest outstanding ping.
    pub fn on_pong(&mut self) {
        if self.pong_deadlines.pop_front().is_none() {
            debug!("stray pong ignored: no outstanding ping");
        }
    }
}
