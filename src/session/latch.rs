use std::collections::HashSet;

use crate::core::state::ResearchStatus;

/// Remembers which terminal statuses already triggered side effects for a
/// session, so duplicate terminal events (a streamed completion followed by
/// a polled one, say) fire them once.
#[derive(Debug, Default)]
pub struct TerminalLatch {
    fired: HashSet<(String, ResearchStatus)>,
}

impl TerminalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `session` is seen in terminal `status`.
    pub fn observe(&mut self, session: &str, status: ResearchStatus) -> bool {
        if !status.is_terminal() {
            return false;
        }
        self.fired.insert((session.to_string(), status))
    }

    pub fn has_fired(&self, session: &str, status: ResearchStatus) -> bool {
        self.fired.contains(&(session.to_string(), status))
    }

    pub fn reset(&mut self) {
        self.fired.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_session_and_status() {
        let mut latch = TerminalLatch::new();
        assert!(latch.observe("p1", ResearchStatus::Completed));
        assert!(!latch.observe("p1", ResearchStatus::Completed));
        assert!(latch.observe("p2", ResearchStatus::Completed));
        assert!(latch.observe("p1", ResearchStatus::AwaitingConfirmation));
        assert!(latch.has_fired("p1", ResearchStatus::Completed));
    }

    #[test]
    fn ignores_non_terminal_statuses() {
        let mut latch = TerminalLatch::new();
        assert!(!latch.observe("p1", ResearchStatus::ResearchCompleted));
        assert!(!latch.observe("p1", ResearchStatus::Coordinate));
    }

    #[test]
    fn reset_rearms() {
        let mut latch = TerminalLatch::new();
        latch.observe("p1", ResearchStatus::PlanGenerated);
        latch.reset();
        assert!(latch.observe("p1", ResearchStatus::PlanGenerated));
    }
}
