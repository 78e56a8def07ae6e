//! Two-key confirmation for destructive actions.
//!
//! A qualifying key arms an action; a matching second key inside the timeout
//! confirms it. Nothing ever fires on a single key press.

use std::time::{Duration, Instant};

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(1);

/// A key the gate cares about. Everything else passes straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKey {
    Char(char),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaryAction {
    Copy,
    Move,
    Delete,
    Quit,
}

impl ScaryAction {
    fn for_key(key: GateKey) -> Option<Self> {
        match key {
            GateKey::Char('c') => Some(ScaryAction::Copy),
            GateKey::Char('m') => Some(ScaryAction::Move),
            GateKey::Char('q') => Some(ScaryAction::Quit),
            GateKey::Delete => Some(ScaryAction::Delete),
            GateKey::Char(_) => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ScaryAction::Copy => "Copy File",
            ScaryAction::Move => "Move File",
            ScaryAction::Delete => "Delete File",
            ScaryAction::Quit => "Quit Viewer",
        }
    }
}

/// A confirmed action, ready to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Move to the destination bound to the key.
    Move(char),
    /// Copy to the destination bound to the key.
    Copy(char),
    Delete,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not the gate's business; dispatch the key normally.
    PassThrough,
    /// First press of a confirmable action; prompt the user.
    Armed(ScaryAction),
    /// Second press matched.
    Confirmed(Confirmation),
    /// Key arrived inside the window but confirmed nothing. Swallowed.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Armed { action: ScaryAction, at: Instant },
}

pub struct ActionGate {
    state: GateState,
    timeout: Duration,
}

impl ActionGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: GateState::Idle,
            timeout,
        }
    }

    pub fn armed(&self) -> Option<ScaryAction> {
        match self.state {
            GateState::Idle => None,
            GateState::Armed { action, .. } => Some(action),
        }
    }

    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }

    /// Whether an autorepeat of `key` could arm or confirm something. Those
    /// repeats are dropped so a held key never confirms itself.
    pub fn repeat_matters(&self, key: Option<GateKey>, now: Instant) -> bool {
        let Some(key) = key else { return false };
        let live = match self.state {
            GateState::Armed { at, .. } => now.saturating_duration_since(at) < self.timeout,
            GateState::Idle => false,
        };
        live || ScaryAction::for_key(key).is_some()
    }

    /// Feed one key press. `key` is `None` for keys that never qualify
    /// (arrows, paging keys and so on). `is_destination` says whether a
    /// character has a configured move/copy destination.
    pub fn press(
        &mut self,
        key: Option<GateKey>,
        now: Instant,
        is_destination: impl Fn(char) -> bool,
    ) -> GateOutcome {
        let Some(key) = key else {
            self.reset();
            return GateOutcome::PassThrough;
        };

        if let GateState::Armed { action, at } = self.state {
            if now.saturating_duration_since(at) < self.timeout {
                return self.second_press(action, key, now, is_destination);
            }
            log::debug!("{} confirmation timed out", action.description());
        }

        match ScaryAction::for_key(key) {
            Some(action) => self.arm(action, now),
            None => {
                self.reset();
                GateOutcome::PassThrough
            }
        }
    }

    fn arm(&mut self, action: ScaryAction, now: Instant) -> GateOutcome {
        log::debug!("Scary action soon? - {}", action.description());
        self.state = GateState::Armed { action, at: now };
        GateOutcome::Armed(action)
    }

    fn second_press(
        &mut self,
        action: ScaryAction,
        key: GateKey,
        now: Instant,
        is_destination: impl Fn(char) -> bool,
    ) -> GateOutcome {
        let confirmed = match (action, key) {
            (ScaryAction::Move, GateKey::Char(c)) if is_destination(c) => Some(Confirmation::Move(c)),
            (ScaryAction::Copy, GateKey::Char(c)) if is_destination(c) => Some(Confirmation::Copy(c)),
            (ScaryAction::Quit, GateKey::Char('q')) => Some(Confirmation::Quit),
            (ScaryAction::Delete, GateKey::Delete) => Some(Confirmation::Delete),
            _ => None,
        };
        if let Some(confirmation) = confirmed {
            log::debug!("Scary action enacted: {:?}", confirmation);
            self.reset();
            return GateOutcome::Confirmed(confirmation);
        }

        if let Some(next) = ScaryAction::for_key(key) {
            return self.arm(next, now);
        }

        // An unbound key after move/copy still picks a destination; the
        // lookup reports it as unknown.
        self.reset();
        match (action, key) {
            (ScaryAction::Move, GateKey::Char(c)) => GateOutcome::Confirmed(Confirmation::Move(c)),
            (ScaryAction::Copy, GateKey::Char(c)) => GateOutcome::Confirmed(Confirmation::Copy(c)),
            _ => GateOutcome::Cancelled,
        }
    }
}

impl Default for ActionGate {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_TIMEOUT)
    }
}
