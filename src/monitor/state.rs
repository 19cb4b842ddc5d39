use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Once an insert pushes the processed set past this, the whole set is
/// cleared. A previously seen command may then run again; bounded memory is
/// worth that small window.
pub const PROCESSED_COMMANDS_CAP: usize = 64;

/// All mutable monitor state, owned by the loop for the life of the process.
/// Nothing here survives a restart.
pub struct MonitorState {
    last_summary_at: Option<DateTime<Utc>>,
    last_balance_check_at: Option<DateTime<Utc>>,
    last_update_cursor: i64,
    processed_commands: HashSet<String>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            last_summary_at: None,
            last_balance_check_at: None,
            last_update_cursor: 0,
            processed_commands: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> i64 {
        self.last_update_cursor
    }

    /// The cursor never moves backwards; a stale value is ignored.
    pub fn advance_cursor(&mut self, cursor: i64) {
        if cursor > self.last_update_cursor {
            self.last_update_cursor = cursor;
        }
    }

    /// A sample is due on the very first cycle and whenever a full interval
    /// has passed since the last attempt.
    pub fn sampling_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        self.last_balance_check_at
            .map_or(true, |at| now - at >= interval)
    }

    /// Marks an attempt, successful or not. A failed sample still counts so
    /// the loop does not tight-retry a broken endpoint.
    pub fn mark_sampled(&mut self, now: DateTime<Utc>) {
        self.last_balance_check_at = Some(now);
    }

    pub fn summary_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        self.last_summary_at.map_or(true, |at| now - at >= interval)
    }

    pub fn mark_summarized(&mut self, now: DateTime<Utc>) {
        self.last_summary_at = Some(now);
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed_commands.contains(key)
    }

    pub fn record_processed(&mut self, key: String) {
        self.processed_commands.insert(key);
        if self.processed_commands.len() > PROCESSED_COMMANDS_CAP {
            debug!(
                cap = PROCESSED_COMMANDS_CAP,
                "processed command set over cap, clearing"
            );
            self.processed_commands.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_only_increases() {
        let mut state = MonitorState::new();
        assert_eq!(state.cursor(), 0);

        state.advance_cursor(10);
        assert_eq!(state.cursor(), 10);

        state.advance_cursor(7);
        assert_eq!(state.cursor(), 10);

        state.advance_cursor(11);
        assert_eq!(state.cursor(), 11);
    }

    #[test]
    fn test_first_sample_is_due_immediately() {
        let state = MonitorState::new();
        assert!(state.sampling_due(Utc::now(), Duration::seconds(60)));
    }

    #[test]
    fn test_sampling_due_after_full_interval() {
        let mut state = MonitorState::new();
        let start = Utc::now();
        let interval = Duration::seconds(60);

        state.mark_sampled(start);
        assert!(!state.sampling_due(start + Duration::seconds(59), interval));
        assert!(state.sampling_due(start + Duration::seconds(60), interval));
    }

    #[test]
    fn test_failed_attempt_still_counts() {
        // The caller marks before sampling; here we just verify marking
        // alone pushes the next due time out a full interval.
        let mut state = MonitorState::new();
        let start = Utc::now();
        state.mark_sampled(start);
        assert!(!state.sampling_due(start + Duration::seconds(1), Duration::seconds(60)));
    }

    #[test]
    fn test_summary_resets_and_does_not_refire_same_second() {
        let mut state = MonitorState::new();
        let interval = Duration::minutes(15);
        let now = Utc::now();

        assert!(state.summary_due(now, interval));
        state.mark_summarized(now);
        assert!(!state.summary_due(now, interval));
        assert!(!state.summary_due(now + Duration::seconds(1), interval));
        assert!(state.summary_due(now + interval, interval));
    }

    #[test]
    fn test_command_processed_exactly_once() {
        let mut state = MonitorState::new();
        let key = "7:/balance:100".to_string();

        assert!(!state.is_processed(&key));
        state.record_processed(key.clone());
        assert!(state.is_processed(&key));
    }

    #[test]
    fn test_processed_set_clears_past_cap() {
        let mut state = MonitorState::new();
        let first = "7:/balance:0".to_string();

        for i in 0..=PROCESSED_COMMANDS_CAP {
            state.record_processed(format!("7:/balance:{}", i));
        }

        // The insert that exceeded the cap wiped the set, so an old key may
        // run again.
        assert!(!state.is_processed(&first));
    }
}
