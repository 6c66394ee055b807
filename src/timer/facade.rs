use std::sync::Arc;

use crate::{
    db::{models::SessionConfig, Database},
    error::SessionError,
    notifier::SessionNotifier,
    settings::SettingsStore,
};

use super::controller::{AppLifecycle, PhaseOutcome, TimerController, TimerSnapshot};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};


/// Entry point for everything that drives a pomodoro session.
#[derive(Clone)]
pub struct SessionFacade {
    db: Database,
    timer: TimerController,
    notifier: Arc<dyn SessionNotifier>,
    settings: Arc<SettingsStore>,
}

impl SessionFacade {
    pub fn new(
        db: Database,
        timer: TimerController,
        notifier: Arc<dyn SessionNotifier>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            db,
            timer,
            notifier,
            settings,
        }
    }

    pub async fn view(&self) -> TimerSnapshot {
        self.timer.snapshot().await
    }

    /// Replace any current session with a new one for `task_id` and start
    /// the first work phase.
    pub async fn start_session(
        &self,
        task_id: &str,
        config: SessionConfig,
    ) -> Result<TimerSnapshot, SessionError> {
        let result = self.try_start_session(task_id, config).await;
        self.surface(result).await
    }

    async fn try_start_session(
        &self,
        task_id: &str,
        config: SessionConfig,
    ) -> Result<TimerSnapshot, SessionError> {
        config.validate().map_err(SessionError::Validation)?;

        let task = self
            .db
            .get_task(task_id)
            .await
            .map_err(SessionError::storage("load task"))?
            .ok_or_else(|| SessionError::TaskNotFound(task_id.to_string()))?;

        let snapshot = self.timer.begin(&task.id, config).await?;

        log_info!(
            "Started pomodoro session for task {} ({}m work, {:?} break, {} iterations)",
            task.id,
            config.work_duration_minutes,
            config.break_type,
            config.total_iterations
        );
        Ok(snapshot)
    }

    pub async fn start_session_with_defaults(
        &self,
        task_id: &str,
    ) -> Result<TimerSnapshot, SessionError> {
        let config = self.settings.session_defaults().into();
        self.start_session(task_id, config).await
    }

    pub async fn pause_timer(&self) -> Result<TimerSnapshot, SessionError> {
        let result = self.timer.pause().await;
        self.surface(result).await
    }

    pub async fn resume_timer(&self) -> TimerSnapshot {
        self.timer.resume().await;
        self.view().await
    }

    pub async fn complete_current_timer(&self) -> Result<PhaseOutcome, SessionError> {
        self.timer.complete_current_timer().await
    }

    /// Drop the active session after the user confirms. Returns `false` if
    /// there was no session or the user backed out.
    pub async fn cancel_session(&self) -> Result<bool, SessionError> {
        if self.view().await.session.is_none() {
            return Ok(false);
        }
        if !self.notifier.confirm_cancel().await {
            log_info!("Session cancel declined");
            return Ok(false);
        }

        let result = self.timer.cancel().await;
        self.surface(result).await?;
        log_warn!("Pomodoro session cancelled");
        Ok(true)
    }

    pub async fn reload_session(&self) -> Result<TimerSnapshot, SessionError> {
        let result = self.timer.reload().await;
        self.surface(result).await
    }

    /// Background failures are already reported by the controller.
    pub async fn handle_lifecycle(&self, event: AppLifecycle) -> Result<TimerSnapshot, SessionError> {
        let result = self.timer.handle_lifecycle(event).await;
        match event {
            AppLifecycle::Background => result,
            AppLifecycle::Foreground => self.surface(result).await,
        }
    }

    pub async fn shutdown(&self) {
        self.timer.shutdown().await;
    }

    /// Storage failures go to the user through the notifier; validation
    /// errors are left for the caller to show inline.
    async fn surface<T>(&self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result {
            if err.is_storage() {
                self.notifier.report_error(&err.to_string()).await;
            }
        }
        result
    }
}
