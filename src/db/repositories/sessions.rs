use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use super::tasks::{count_subtasks, query_subtasks, query_task};
use crate::db::{
    connection::Database,
    helpers::{parse_break_type, parse_datetime, parse_timer_type, to_optional_u32, to_u32},
    models::{
        PomodoroSession, SessionConfig, SessionUpdate, SessionView, TimerType, SESSION_ROW_ID,
    },
};

const SESSION_COLUMNS: &str = "task_id, work_duration_minutes, break_type, total_iterations,
     current_iteration, current_subtask_index, timer_type, remaining_seconds, is_paused,
     started_at, updated_at";

fn row_to_session(row: &Row) -> Result<PomodoroSession> {
    let work_duration_minutes: i64 = row.get("work_duration_minutes")?;
    let break_type: String = row.get("break_type")?;
    let total_iterations: i64 = row.get("total_iterations")?;
    let current_iteration: i64 = row.get("current_iteration")?;
    let current_subtask_index: Option<i64> = row.get("current_subtask_index")?;
    let timer_type: String = row.get("timer_type")?;
    let remaining_seconds: i64 = row.get("remaining_seconds")?;
    let started_at: String = row.get("started_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(PomodoroSession {
        task_id: row.get("task_id")?,
        work_duration_minutes: to_u32(work_duration_minutes, "work_duration_minutes")?,
        break_type: parse_break_type(&break_type)?,
        total_iterations: to_u32(total_iterations, "total_iterations")?,
        current_iteration: to_u32(current_iteration, "current_iteration")?,
        current_subtask_index: to_optional_u32(current_subtask_index, "current_subtask_index")?,
        timer_type: parse_timer_type(&timer_type)?,
        remaining_seconds: to_u32(remaining_seconds, "remaining_seconds")?,
        is_paused: row.get("is_paused")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn query_session(conn: &Connection) -> Result<Option<PomodoroSession>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM pomodoro_session WHERE id = ?1"
    ))?;

    let mut rows = stmt.query(params![SESSION_ROW_ID])?;
    let session = match rows.next()? {
        Some(row) => Some(row_to_session(row)?),
        None => None,
    };
    Ok(session)
}

impl Database {
    pub async fn get_active_session(&self) -> Result<Option<PomodoroSession>> {
        self.execute(|conn| query_session(conn)).await
    }

    /// Session joined with its task and the task's live subtask list.
    ///
    /// Returns `None` when there is no session or when the session points at
    /// a task that no longer exists.
    pub async fn get_session_with_task(&self) -> Result<Option<SessionView>> {
        self.execute(|conn| {
            let Some(session) = query_session(conn)? else {
                return Ok(None);
            };
            let Some(task) = query_task(conn, &session.task_id)? else {
                return Ok(None);
            };
            let subtasks = query_subtasks(conn, &task.id)?;

            Ok(Some(SessionView {
                session,
                task_name: task.name,
                task_description: task.description,
                subtasks,
            }))
        })
        .await
    }

    /// Replace any existing session with a fresh one for `task_id`.
    ///
    /// The delete and insert run in one transaction, so a failure leaves the
    /// previous row untouched.
    pub async fn create_session(
        &self,
        task_id: &str,
        config: SessionConfig,
    ) -> Result<PomodoroSession> {
        let task_id = task_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM pomodoro_session WHERE id = ?1",
                params![SESSION_ROW_ID],
            )?;

            let has_subtasks = count_subtasks(&tx, &task_id)? > 0;
            let now = Utc::now();
            let session = PomodoroSession {
                task_id,
                work_duration_minutes: config.work_duration_minutes,
                break_type: config.break_type,
                total_iterations: config.total_iterations,
                current_iteration: 1,
                current_subtask_index: has_subtasks.then_some(0),
                timer_type: TimerType::Work,
                remaining_seconds: config.work_duration_secs(),
                is_paused: false,
                started_at: now,
                updated_at: now,
            };

            tx.execute(
                "INSERT INTO pomodoro_session (id, task_id, work_duration_minutes, break_type,
                    total_iterations, current_iteration, current_subtask_index, timer_type,
                    remaining_seconds, is_paused, started_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    SESSION_ROW_ID,
                    session.task_id,
                    session.work_duration_minutes,
                    session.break_type.as_str(),
                    session.total_iterations,
                    session.current_iteration,
                    session.current_subtask_index,
                    session.timer_type.as_str(),
                    session.remaining_seconds,
                    session.is_paused,
                    session.started_at.to_rfc3339(),
                    session.updated_at.to_rfc3339(),
                ],
            )?;

            tx.commit()?;
            Ok(session)
        })
        .await
    }

    /// Merge `update` into the stored session. Does nothing if no session exists.
    pub async fn update_session(&self, update: SessionUpdate) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut session) = query_session(&tx)? else {
                return Ok(());
            };

            update.apply_to(&mut session);

            tx.execute(
                "UPDATE pomodoro_session
                 SET current_iteration = ?1,
                     current_subtask_index = ?2,
                     timer_type = ?3,
                     remaining_seconds = ?4,
                     is_paused = ?5,
                     updated_at = ?6
                 WHERE id = ?7",
                params![
                    session.current_iteration,
                    session.current_subtask_index,
                    session.timer_type.as_str(),
                    session.remaining_seconds,
                    session.is_paused,
                    Utc::now().to_rfc3339(),
                    SESSION_ROW_ID,
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Write only the countdown and paused flag.
    pub async fn update_session_timer(&self, remaining_seconds: u32, is_paused: bool) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "UPDATE pomodoro_session
                 SET remaining_seconds = ?1,
                     is_paused = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    remaining_seconds,
                    is_paused,
                    Utc::now().to_rfc3339(),
                    SESSION_ROW_ID,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Remove the session row. Succeeds when there is nothing to remove.
    pub async fn delete_session(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute(
                "DELETE FROM pomodoro_session WHERE id = ?1",
                params![SESSION_ROW_ID],
            )
            .map_err(|err| anyhow!("failed to delete session: {err}"))?;
            Ok(())
        })
        .await
    }
}
