//! Pomodoro session engine for a task list app.
//!
//! [`bootstrap`] wires storage, settings and the timer together and hands
//! back an [`App`] whose [`SessionFacade`] is the entry point for callers.

mod utils;

pub mod db;
pub mod error;
pub mod notifier;
pub mod settings;
pub mod timer;

use std::{path::Path, sync::Arc};

use anyhow::Context;

pub use db::{
    BreakType, Database, PomodoroSession, SessionConfig, SessionView, Subtask, Task, TimerType,
};
pub use error::SessionError;
pub use notifier::{LogNotifier, PhasePrompt, PromptAction, SessionNotifier};
pub use settings::{SessionDefaults, SettingsStore};
pub use timer::{
    AppLifecycle, PhaseOutcome, SessionFacade, TimerController, TimerSnapshot, TimerStatus,
};
pub use utils::init_logging;

const ENABLE_LOGS: bool = true;

pub const DATABASE_FILE: &str = "pomotask.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Everything a running app holds on to.
#[derive(Clone)]
pub struct App {
    pub db: Database,
    pub sessions: SessionFacade,
    pub settings: Arc<SettingsStore>,
}

/// Open storage and settings under `data_dir` and pick up any session left
/// behind by the previous run.
pub async fn bootstrap(data_dir: &Path, notifier: Arc<dyn SessionNotifier>) -> anyhow::Result<App> {
    init_logging();
    log_info!("Pomotask starting up...");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let db = Database::new(data_dir.join(DATABASE_FILE))?;
    let settings = Arc::new(SettingsStore::new(data_dir.join(SETTINGS_FILE))?);

    let timer = TimerController::new(db.clone(), notifier.clone());
    let sessions = SessionFacade::new(db.clone(), timer, notifier, settings.clone());

    let snapshot = sessions
        .reload_session()
        .await
        .context("Failed to restore pomodoro session")?;
    if let Some(view) = &snapshot.session {
        log_warn!(
            "Recovered pomodoro session for task {} (iteration {} of {}, {} phase, {}s left, {})",
            view.session.task_id,
            view.session.current_iteration,
            view.session.total_iterations,
            view.session.timer_type.as_str(),
            snapshot.remaining_seconds,
            if snapshot.is_running { "running" } else { "paused" }
        );
    }

    Ok(App {
        db,
        sessions,
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::testing::RecordingNotifier;

    #[tokio::test]
    async fn bootstrap_creates_files_and_starts_idle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let data_dir = dir.path().join("nested").join("data");
        let notifier = Arc::new(RecordingNotifier::new(PromptAction::Dismiss));

        let app = bootstrap(&data_dir, notifier).await.expect("bootstrap");

        assert!(data_dir.join(DATABASE_FILE).exists());
        let view = app.sessions.view().await;
        assert_eq!(view.status, TimerStatus::Idle);
        assert!(view.session.is_none());
        assert_eq!(app.settings.session_defaults(), SessionDefaults::default());
        app.sessions.shutdown().await;
    }

    #[tokio::test]
    async fn bootstrap_recovers_session_from_previous_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let data_dir = dir.path().to_path_buf();

        {
            let db = Database::new(data_dir.join(DATABASE_FILE)).expect("open database");
            let task = db
                .create_task("Write report".to_string(), None)
                .await
                .expect("create task");
            db.create_session(
                &task.id,
                SessionConfig {
                    work_duration_minutes: 25,
                    break_type: BreakType::Short,
                    total_iterations: 2,
                },
            )
            .await
            .expect("create session");
            db.update_session_timer(900, true).await.expect("pause");
        }

        let notifier = Arc::new(RecordingNotifier::new(PromptAction::Dismiss));
        let app = bootstrap(&data_dir, notifier).await.expect("bootstrap");

        let view = app.sessions.view().await;
        assert_eq!(view.remaining_seconds, 900);
        assert!(!view.is_running);
        assert_eq!(view.status, TimerStatus::Paused);
        assert_eq!(
            view.session.expect("session").task_name,
            "Write report".to_string()
        );
        app.sessions.shutdown().await;
    }
}
