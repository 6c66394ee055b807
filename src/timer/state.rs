use serde::{Deserialize, Serialize};

use crate::db::models::SessionView;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl Default for TimerStatus {
    fn default() -> Self {
        TimerStatus::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer was not running; nothing changed.
    Skipped,
    Ticked { remaining_seconds: u32 },
    /// The countdown hit zero and the timer froze itself.
    Expired,
}

/// In-memory side of the active session.
///
/// `remaining_seconds` is authoritative only while `status` is `Running`;
/// otherwise it mirrors what was last persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub session: Option<SessionView>,
    pub remaining_seconds: u32,
    /// Bumped whenever a ticker is started or cancelled; a ticker holding an
    /// older value must not touch this state.
    #[serde(skip)]
    pub generation: u64,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Seed from a freshly stored snapshot. The running flag follows the
    /// persisted `is_paused` column.
    pub fn seed(&mut self, view: Option<SessionView>) {
        let generation = self.generation;
        *self = match view {
            Some(view) => Self {
                status: if view.session.is_paused {
                    TimerStatus::Paused
                } else {
                    TimerStatus::Running
                },
                remaining_seconds: view.session.remaining_seconds,
                session: Some(view),
                generation,
            },
            None => Self {
                generation,
                ..Self::default()
            },
        };
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::Skipped;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.status = TimerStatus::Paused;
            return TickOutcome::Expired;
        }

        TickOutcome::Ticked {
            remaining_seconds: self.remaining_seconds,
        }
    }

    pub fn freeze(&mut self) {
        if self.has_session() {
            self.status = TimerStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.has_session() {
            self.status = TimerStatus::Running;
        }
    }

    pub fn cancel(&mut self) {
        let generation = self.generation;
        *self = Self {
            generation,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{BreakType, PomodoroSession, TimerType};
    use chrono::Utc;

    fn view(remaining_seconds: u32, is_paused: bool) -> SessionView {
        let now = Utc::now();
        SessionView {
            session: PomodoroSession {
                task_id: "tsk-1".to_string(),
                work_duration_minutes: 25,
                break_type: BreakType::Short,
                total_iterations: 1,
                current_iteration: 1,
                current_subtask_index: None,
                timer_type: TimerType::Work,
                remaining_seconds,
                is_paused,
                started_at: now,
                updated_at: now,
            },
            task_name: "Task".to_string(),
            task_description: None,
            subtasks: Vec::new(),
        }
    }

    #[test]
    fn seed_follows_persisted_pause_flag() {
        let mut state = TimerState::new();
        state.seed(Some(view(900, true)));
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.remaining_seconds, 900);

        state.seed(Some(view(600, false)));
        assert!(state.is_running());
        assert_eq!(state.remaining_seconds, 600);

        state.seed(None);
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.remaining_seconds, 0);
        assert!(!state.has_session());
    }

    #[test]
    fn tick_counts_down_and_expires_at_zero() {
        let mut state = TimerState::new();
        state.seed(Some(view(2, false)));

        assert_eq!(
            state.tick(),
            TickOutcome::Ticked {
                remaining_seconds: 1
            }
        );
        assert_eq!(state.tick(), TickOutcome::Expired);
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.tick(), TickOutcome::Skipped);
        assert_eq!(state.remaining_seconds, 0);
    }

    #[test]
    fn tick_is_skipped_while_paused_or_idle() {
        let mut state = TimerState::new();
        assert_eq!(state.tick(), TickOutcome::Skipped);

        state.seed(Some(view(10, true)));
        assert_eq!(state.tick(), TickOutcome::Skipped);
        assert_eq!(state.remaining_seconds, 10);
    }

    #[test]
    fn resume_and_freeze_need_a_session() {
        let mut state = TimerState::new();
        state.resume();
        assert_eq!(state.status, TimerStatus::Idle);

        state.seed(Some(view(10, true)));
        state.resume();
        assert!(state.is_running());
        state.freeze();
        assert_eq!(state.status, TimerStatus::Paused);
    }

    #[test]
    fn cancel_keeps_generation() {
        let mut state = TimerState::new();
        state.seed(Some(view(10, false)));
        state.generation = 7;

        state.cancel();

        assert_eq!(state.generation, 7);
        assert_eq!(state.status, TimerStatus::Idle);
        assert!(state.session.is_none());
    }
}
