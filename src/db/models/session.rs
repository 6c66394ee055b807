//! Pomodoro session data models.
//!
//! - `PomodoroSession`: the singleton row in `pomodoro_session`.
//! - `SessionConfig`: what the caller chooses when starting a session.
//! - `SessionUpdate`: a partial set of fields merged by `update_session`.
//! - `SessionView`: the session joined with its task and live subtasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Subtask;

/// Fixed primary key of the only session row.
pub const SESSION_ROW_ID: i64 = 1;

pub const SHORT_BREAK_SECS: u32 = 120;
pub const LONG_BREAK_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BreakType {
    Short,
    Long,
}

impl BreakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakType::Short => "short",
            BreakType::Long => "long",
        }
    }

    pub fn duration_secs(&self) -> u32 {
        match self {
            BreakType::Short => SHORT_BREAK_SECS,
            BreakType::Long => LONG_BREAK_SECS,
        }
    }

    /// Phase that follows a completed work phase.
    pub fn timer_type(&self) -> TimerType {
        match self {
            BreakType::Short => TimerType::ShortBreak,
            BreakType::Long => TimerType::LongBreak,
        }
    }
}

impl Default for BreakType {
    fn default() -> Self {
        BreakType::Short
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerType {
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerType::Work => "work",
            TimerType::ShortBreak => "shortBreak",
            TimerType::LongBreak => "longBreak",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, TimerType::Work)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub work_duration_minutes: u32,
    pub break_type: BreakType,
    pub total_iterations: u32,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.work_duration_minutes == 0 {
            return Err("work_duration_minutes must be > 0".to_string());
        }
        if self.total_iterations == 0 {
            return Err("total_iterations must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn work_duration_secs(&self) -> u32 {
        self.work_duration_minutes.saturating_mul(60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub task_id: String,
    pub work_duration_minutes: u32,
    pub break_type: BreakType,
    pub total_iterations: u32,
    pub current_iteration: u32,
    pub current_subtask_index: Option<u32>,
    pub timer_type: TimerType,
    pub remaining_seconds: u32,
    pub is_paused: bool,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PomodoroSession {
    pub fn work_duration_secs(&self) -> u32 {
        self.work_duration_minutes.saturating_mul(60)
    }
}

/// Fields `update_session` may overwrite. `None` leaves the stored value as is.
///
/// `current_subtask_index` is doubly optional: `Some(None)` clears the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub current_iteration: Option<u32>,
    pub current_subtask_index: Option<Option<u32>>,
    pub timer_type: Option<TimerType>,
    pub remaining_seconds: Option<u32>,
    pub is_paused: Option<bool>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self == &SessionUpdate::default()
    }

    pub fn apply_to(&self, session: &mut PomodoroSession) {
        if let Some(iteration) = self.current_iteration {
            session.current_iteration = iteration;
        }
        if let Some(index) = self.current_subtask_index {
            session.current_subtask_index = index;
        }
        if let Some(timer_type) = self.timer_type {
            session.timer_type = timer_type;
        }
        if let Some(remaining) = self.remaining_seconds {
            session.remaining_seconds = remaining;
        }
        if let Some(paused) = self.is_paused {
            session.is_paused = paused;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session: PomodoroSession,
    pub task_name: String,
    pub task_description: Option<String>,
    pub subtasks: Vec<Subtask>,
}

impl SessionView {
    /// Subtask the current work phase is aligned with, if the index is
    /// still within the live subtask list.
    pub fn active_subtask(&self) -> Option<&Subtask> {
        let index = self.session.current_subtask_index?;
        self.subtasks.get(index as usize)
    }
}
