//! Debounced autosave scheduling.
//!
//! # Invariants
//! - At most one pending deadline; re-arming replaces it.
//! - A due deadline fires once and is then cleared.
//! - The scheduler never fires a session it was not armed for.

use uuid::Uuid;

/// Default quiet period before an autosave fires.
pub const DEFAULT_AUTOSAVE_DELAY_MS: i64 = 500;

/// Deadline-based debounce over an injected clock (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveScheduler {
    delay_ms: i64,
    pending: Option<(Uuid, i64)>,
}

impl Default for AutosaveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_DELAY_MS)
    }
}

impl AutosaveScheduler {
    pub fn new(delay_ms: i64) -> Self {
        Self {
            delay_ms: delay_ms.max(0),
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Restarts the quiet period for `session_id`.
    pub fn arm(&mut self, session_id: Uuid, now_ms: i64) {
        self.pending = Some((session_id, now_ms.saturating_add(self.delay_ms)));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline_ms(&self) -> Option<i64> {
        self.pending.map(|(_, deadline)| deadline)
    }

    /// Returns the armed session once its deadline has passed.
    pub fn take_due(&mut self, now_ms: i64) -> Option<Uuid> {
        match self.pending {
            Some((session_id, deadline)) if now_ms >= deadline => {
                self.pending = None;
                Some(session_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AutosaveScheduler;
    use uuid::Uuid;

    #[test]
    fn rearming_restarts_the_quiet_period() {
        let session = Uuid::new_v4();
        let mut scheduler = AutosaveScheduler::new(500);

        scheduler.arm(session, 0);
        scheduler.arm(session, 400);
        assert_eq!(scheduler.take_due(600), None);
        assert_eq!(scheduler.take_due(900), Some(session));
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.take_due(2_000), None);
    }

    #[test]
    fn cancel_drops_pending_deadline() {
        let mut scheduler = AutosaveScheduler::default();
        scheduler.arm(Uuid::new_v4(), 10);
        assert_eq!(scheduler.deadline_ms(), Some(510));

        scheduler.cancel();
        assert_eq!(scheduler.take_due(10_000), None);
    }
}
