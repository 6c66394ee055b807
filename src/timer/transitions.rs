//! Phase transitions for a pomodoro session.
//!
//! Everything here is pure: each function looks at the stored session plus
//! the task's live subtask list and says what to persist next. Side effects
//! (marking a subtask done, deleting a finished session) are left to the
//! caller.

use crate::db::models::{PomodoroSession, SessionUpdate, Subtask, TimerType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTransition {
    /// Subtask aligned with the finished work phase, if it still exists and
    /// is not completed yet. Must be marked complete before `update` is
    /// persisted.
    pub subtask_to_complete: Option<String>,
    pub update: SessionUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakTransition {
    pub update: SessionUpdate,
    pub session_should_end: bool,
}

/// A work phase ran out.
///
/// The iteration counter and the subtask index both advance here, so the
/// next work phase lines up with the next subtask.
pub fn complete_work_session(session: &PomodoroSession, subtasks: &[Subtask]) -> WorkTransition {
    let subtask_to_complete = session
        .current_subtask_index
        .and_then(|index| subtasks.get(index as usize))
        .filter(|subtask| !subtask.is_completed)
        .map(|subtask| subtask.id.clone());

    let update = SessionUpdate {
        current_iteration: Some(session.current_iteration.saturating_add(1)),
        current_subtask_index: session
            .current_subtask_index
            .map(|index| Some(index.saturating_add(1))),
        timer_type: Some(session.break_type.timer_type()),
        remaining_seconds: Some(session.break_type.duration_secs()),
        is_paused: Some(false),
    };

    WorkTransition {
        subtask_to_complete,
        update,
    }
}

/// A break ran out.
///
/// The session ends only once `current_iteration` has moved past
/// `total_iterations`, which means the break after the last work phase is
/// always served in full.
pub fn complete_break_session(session: &PomodoroSession) -> BreakTransition {
    if session.current_iteration > session.total_iterations {
        return BreakTransition {
            update: SessionUpdate::default(),
            session_should_end: true,
        };
    }

    BreakTransition {
        update: SessionUpdate {
            timer_type: Some(TimerType::Work),
            remaining_seconds: Some(session.work_duration_secs()),
            is_paused: Some(false),
            ..SessionUpdate::default()
        },
        session_should_end: false,
    }
}
