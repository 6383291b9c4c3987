use std::{
    num::NonZeroU64,
    time::{
        Duration,
        Instant,
    },
};
use thiserror::Error;

/// Hard ceiling on tapping time within one session.
pub const MAX_SESSION: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Active,
    TimedOut,
    ClaimPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session is already running")]
    AlreadyActive,
    #[error("no session is running")]
    NotActive,
    #[error("a claim is already in progress")]
    ClaimInFlight,
    #[error("no taps to claim yet")]
    ZeroTaps,
}

/// Wall-clock time of a session minus the time spent waiting on claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionClock {
    started_at: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl SessionClock {
    fn start(now: Instant) -> Self {
        Self {
            started_at: now,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimRequest {
    pub session_id: u64,
    pub tap_count: NonZeroU64,
}

/// Tap session state machine. Time is always passed in so the transitions
/// stay deterministic.
#[derive(Clone, Debug, Default)]
pub struct Session {
    phase: Phase,
    tap_count: u64,
    clock: Option<SessionClock>,
    session_id: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn tap_count(&self) -> u64 {
        self.tap_count
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn clock(&self) -> Option<&SessionClock> {
        self.clock.as_ref()
    }

    /// Elapsed session time, capped at [`MAX_SESSION`].
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.clock
            .map(|clock| clock.elapsed(now).min(MAX_SESSION))
            .unwrap_or_default()
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.clock {
            Some(_) => MAX_SESSION.saturating_sub(self.elapsed(now)),
            None => Duration::ZERO,
        }
    }

    pub fn can_tap(&self, now: Instant) -> bool {
        self.phase == Phase::Active && self.elapsed(now) < MAX_SESSION
    }

    pub fn start(&mut self, now: Instant) -> Result<u64, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }
        self.session_id += 1;
        self.phase = Phase::Active;
        self.tap_count = 0;
        self.clock = Some(SessionClock::start(now));
        Ok(self.session_id)
    }

    /// Counts one tap. Returns whether it was counted.
    pub fn tap(&mut self, now: Instant) -> bool {
        self.tick(now);
        if !self.can_tap(now) {
            return false;
        }
        self.tap_count += 1;
        true
    }

    /// Returns `true` exactly once, on the tick that hits the ceiling.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.phase == Phase::Active && self.elapsed(now) >= MAX_SESSION {
            self.phase = Phase::TimedOut;
            return true;
        }
        false
    }

    pub fn begin_claim(&mut self, now: Instant) -> Result<ClaimRequest, SessionError> {
        self.tick(now);
        match self.phase {
            Phase::Idle => return Err(SessionError::NotActive),
            Phase::ClaimPending => return Err(SessionError::ClaimInFlight),
            Phase::Active | Phase::TimedOut => {}
        }
        let tap_count = NonZeroU64::new(self.tap_count).ok_or(SessionError::ZeroTaps)?;
        if let Some(clock) = self.clock.as_mut() {
            clock.pause(now);
        }
        self.phase = Phase::ClaimPending;
        Ok(ClaimRequest {
            session_id: self.session_id,
            tap_count,
        })
    }

    /// Ends the session if the claim belongs to it. Returns whether it did.
    pub fn claim_succeeded(&mut self, session_id: u64) -> bool {
        if !self.owns_pending_claim(session_id) {
            return false;
        }
        self.reset();
        true
    }

    /// Re-arms the session with its taps intact and the timer resumed.
    pub fn claim_failed(&mut self, session_id: u64, now: Instant) -> bool {
        if !self.owns_pending_claim(session_id) {
            return false;
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.resume(now);
        }
        self.phase = if self.elapsed(now) >= MAX_SESSION {
            Phase::TimedOut
        } else {
            Phase::Active
        };
        true
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.tap_count = 0;
        self.clock = None;
    }

    fn owns_pending_claim(&self, session_id: u64) -> bool {
        self.phase == Phase::ClaimPending && self.session_id == session_id
    }
}
