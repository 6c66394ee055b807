use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::{
        models::{SessionConfig, SessionView, TimerType},
        Database,
    },
    error::SessionError,
    notifier::{PhasePrompt, PromptAction, SessionNotifier},
};

use super::{
    state::{TickOutcome, TimerState, TimerStatus},
    transitions::{complete_break_session, complete_work_session},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Read-only view handed to callers and to `SessionNotifier::state_changed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub session: Option<SessionView>,
    pub remaining_seconds: u32,
    pub is_running: bool,
}

impl From<&TimerState> for TimerSnapshot {
    fn from(state: &TimerState) -> Self {
        Self {
            status: state.status,
            session: state.session.clone(),
            remaining_seconds: state.remaining_seconds,
            is_running: state.is_running(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// There was nothing to complete, or the session changed while the
    /// prompt was open.
    NoSession,
    /// Work finished and the break is set up; `started` says whether the
    /// break is running.
    BreakReady { started: bool },
    WorkReady { started: bool },
    Finished { task_id: String, iterations: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    Background,
    Foreground,
}

/// One phase of one session. A prompt answer only applies while the timer
/// still holds the phase it was asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PhaseKey {
    task_id: String,
    started_at: DateTime<Utc>,
    current_iteration: u32,
    timer_type: TimerType,
}

impl PhaseKey {
    fn of(view: &SessionView) -> Self {
        Self {
            task_id: view.session.task_id.clone(),
            started_at: view.session.started_at,
            current_iteration: view.session.current_iteration,
            timer_type: view.session.timer_type,
        }
    }
}

enum Completion {
    Done(PhaseOutcome),
    Prompt { prompt: PhasePrompt, next: PhaseKey },
}

type TickerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the in-memory countdown for the active session.
///
/// Cloning is cheap and every clone drives the same state and ticker.
/// Operations that write the session row run one at a time under
/// `operations`; lock order is operations, ticker, state.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    db: Database,
    notifier: Arc<dyn SessionNotifier>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    operations: Arc<Mutex<()>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
}

impl TimerController {
    pub fn new(db: Database, notifier: Arc<dyn SessionNotifier>) -> Self {
        let debug_mode = std::env::var("POMOTASK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            db,
            notifier,
            ticker: Arc::new(Mutex::new(None)),
            operations: Arc::new(Mutex::new(())),
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_heartbeat_every_ticks(mut self, ticks: u32) -> Self {
        self.heartbeat_every_ticks = ticks.max(1);
        self
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from(&*self.state.lock().await)
    }

    /// Replace whatever session is stored with a fresh one for `task_id`
    /// and start its first work phase. The task must already exist.
    pub async fn begin(
        &self,
        task_id: &str,
        config: SessionConfig,
    ) -> Result<TimerSnapshot, SessionError> {
        let _operation = self.operations.lock().await;
        self.cancel_ticker().await;

        if let Err(err) = self.db.create_session(task_id, config).await {
            let err = SessionError::storage("create session")(err);
            log_error!("Failed to create session: {err}");
            // The previous row survives a failed create; resync with it.
            if let Err(reload_err) = self.reload_locked().await {
                log_warn!("Reload after failed create also failed: {reload_err}");
                self.freeze_and_emit().await;
            }
            return Err(err);
        }

        let view = match self.db.get_session_with_task().await {
            Ok(Some(view)) => view,
            Ok(None) => {
                // Task deleted between the caller's check and the insert.
                self.reload_locked().await?;
                return Err(SessionError::TaskNotFound(task_id.to_string()));
            }
            Err(err) => {
                self.freeze_and_emit().await;
                return Err(SessionError::storage("load new session")(err));
            }
        };

        {
            let mut state = self.state.lock().await;
            state.seed(Some(view));
            state.resume();
        }
        self.spawn_ticker().await;
        self.emit_state_changed().await;
        Ok(self.snapshot().await)
    }

    /// Throw away the in-memory countdown and take whatever storage says.
    pub async fn reload(&self) -> Result<TimerSnapshot, SessionError> {
        let _operation = self.operations.lock().await;
        self.reload_locked().await
    }

    async fn reload_locked(&self) -> Result<TimerSnapshot, SessionError> {
        let view = self
            .db
            .get_session_with_task()
            .await
            .map_err(SessionError::storage("reload session"))?;

        self.cancel_ticker().await;
        let running = {
            let mut state = self.state.lock().await;
            state.seed(view);
            state.is_running()
        };
        if running {
            self.spawn_ticker().await;
        }

        self.emit_state_changed().await;
        Ok(self.snapshot().await)
    }

    /// Freeze the countdown, persist it, then resync from storage.
    pub async fn pause(&self) -> Result<TimerSnapshot, SessionError> {
        let _operation = self.operations.lock().await;
        if !self.state.lock().await.has_session() {
            return Ok(self.snapshot().await);
        }

        self.cancel_ticker().await;
        let (remaining, was_running) = {
            let state = self.state.lock().await;
            (state.remaining_seconds, state.is_running())
        };

        if let Err(err) = self.db.update_session_timer(remaining, true).await {
            let err = SessionError::storage("pause timer")(err);
            log_error!("Failed to persist paused timer: {err}");
            self.recover_after_failed_write(was_running).await;
            return Err(err);
        }

        self.reload_locked().await
    }

    /// Optimistic: flips the in-memory flag only. The stored row catches up
    /// on the next heartbeat, pause or background.
    pub async fn resume(&self) {
        let _operation = self.operations.lock().await;
        self.resume_locked().await;
    }

    async fn resume_locked(&self) {
        let should_tick = {
            let mut state = self.state.lock().await;
            if !state.has_session() || state.is_running() {
                false
            } else {
                state.resume();
                true
            }
        };

        if should_tick {
            self.spawn_ticker().await;
            self.emit_state_changed().await;
        }
    }

    pub async fn handle_lifecycle(&self, event: AppLifecycle) -> Result<TimerSnapshot, SessionError> {
        match event {
            AppLifecycle::Background => self.enter_background().await,
            AppLifecycle::Foreground => {
                log_info!("App returned to foreground; reloading session");
                self.reload().await
            }
        }
    }

    async fn enter_background(&self) -> Result<TimerSnapshot, SessionError> {
        let _operation = self.operations.lock().await;
        self.cancel_ticker().await;
        let remaining = {
            let mut state = self.state.lock().await;
            if !state.has_session() {
                return Ok(TimerSnapshot::from(&*state));
            }
            state.freeze();
            state.remaining_seconds
        };

        if let Err(err) = self.db.update_session_timer(remaining, true).await {
            let err = SessionError::storage("persist timer on background")(err);
            log_error!("{err}");
            self.notifier.report_error(&err.to_string()).await;
            return Err(err);
        }

        log_info!("App backgrounded with {remaining}s remaining");
        self.emit_state_changed().await;
        Ok(self.snapshot().await)
    }

    /// Remove the stored session and go idle.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let _operation = self.operations.lock().await;
        self.cancel_ticker().await;
        let was_running = self.state.lock().await.is_running();

        if let Err(err) = self.db.delete_session().await {
            let err = SessionError::storage("cancel session")(err);
            log_error!("Failed to delete session: {err}");
            self.recover_after_failed_write(was_running).await;
            return Err(err);
        }

        self.state.lock().await.cancel();
        self.emit_state_changed().await;
        Ok(())
    }

    /// Run the phase transition for the phase that just ran out.
    ///
    /// On failure the error is reported and the timer stays frozen; a later
    /// `reload` picks up whatever made it to storage.
    pub async fn complete_current_timer(&self) -> Result<PhaseOutcome, SessionError> {
        self.complete_phase(None).await
    }

    /// `expected_generation` is set when a ticker expired: the completion is
    /// dropped if anything restarted or cancelled the timer since.
    async fn complete_phase(
        &self,
        expected_generation: Option<u64>,
    ) -> Result<PhaseOutcome, SessionError> {
        let result = self.run_completion(expected_generation).await;
        if let Err(err) = &result {
            log_error!("Phase completion failed: {err}");
            self.notifier.report_error(&err.to_string()).await;
            self.emit_state_changed().await;
        }
        result
    }

    async fn run_completion(
        &self,
        expected_generation: Option<u64>,
    ) -> Result<PhaseOutcome, SessionError> {
        let (prompt, next) = {
            let _operation = self.operations.lock().await;
            if let Some(expected) = expected_generation {
                if self.state.lock().await.generation != expected {
                    log_info!("Timer changed before its expiry was handled; skipping");
                    return Ok(PhaseOutcome::NoSession);
                }
            }

            self.cancel_ticker().await;
            self.state.lock().await.freeze();
            match self.advance_phase().await? {
                Completion::Done(outcome) => return Ok(outcome),
                Completion::Prompt { prompt, next } => (prompt, next),
            }
        };

        // The prompt may stay open indefinitely; nothing is locked here.
        let action = self.notifier.prompt_phase_complete(prompt).await;

        let _operation = self.operations.lock().await;
        let (current, running, remaining) = {
            let state = self.state.lock().await;
            (
                state.session.as_ref().map(PhaseKey::of),
                state.is_running(),
                state.remaining_seconds,
            )
        };
        if current.as_ref() != Some(&next) {
            log_warn!("Session changed while the phase prompt was open; ignoring {action:?}");
            return Ok(PhaseOutcome::NoSession);
        }

        let started = match action {
            PromptAction::Continue => {
                self.resume_locked().await;
                true
            }
            // Already resumed by hand; leave it running.
            PromptAction::Dismiss if running => true,
            PromptAction::Dismiss => {
                self.db
                    .update_session_timer(remaining, true)
                    .await
                    .map_err(SessionError::storage("hold next phase"))?;
                false
            }
        };

        Ok(if next.timer_type.is_break() {
            PhaseOutcome::BreakReady { started }
        } else {
            PhaseOutcome::WorkReady { started }
        })
    }

    async fn advance_phase(&self) -> Result<Completion, SessionError> {
        let Some(view) = self
            .db
            .get_session_with_task()
            .await
            .map_err(SessionError::storage("load session for completion"))?
        else {
            self.state.lock().await.cancel();
            self.emit_state_changed().await;
            return Ok(Completion::Done(PhaseOutcome::NoSession));
        };

        let session = &view.session;
        let prompt = match session.timer_type {
            TimerType::Work => {
                let transition = complete_work_session(session, &view.subtasks);
                if let Some(subtask_id) = &transition.subtask_to_complete {
                    self.db
                        .mark_subtask_completed(subtask_id)
                        .await
                        .map_err(SessionError::storage("complete subtask"))?;
                }
                self.db
                    .update_session(transition.update)
                    .await
                    .map_err(SessionError::storage("start break"))?;

                log_info!(
                    "Work phase {} of {} finished for task {}",
                    session.current_iteration,
                    session.total_iterations,
                    session.task_id
                );
                PhasePrompt::StartBreak {
                    break_type: session.break_type,
                    completed_iteration: session.current_iteration,
                    total_iterations: session.total_iterations,
                }
            }
            TimerType::ShortBreak | TimerType::LongBreak => {
                let transition = complete_break_session(session);
                if transition.session_should_end {
                    return self.finish_session(&view).await.map(Completion::Done);
                }
                self.db
                    .update_session(transition.update)
                    .await
                    .map_err(SessionError::storage("resume work"))?;

                PhasePrompt::ResumeWork {
                    iteration: session.current_iteration,
                    total_iterations: session.total_iterations,
                }
            }
        };

        let next_view = self
            .db
            .get_session_with_task()
            .await
            .map_err(SessionError::storage("load next phase"))?;
        let Some(next_view) = next_view else {
            self.state.lock().await.cancel();
            self.emit_state_changed().await;
            return Ok(Completion::Done(PhaseOutcome::NoSession));
        };

        let next = PhaseKey::of(&next_view);
        {
            let mut state = self.state.lock().await;
            state.seed(Some(next_view));
            state.freeze();
        }
        self.emit_state_changed().await;

        Ok(Completion::Prompt { prompt, next })
    }

    async fn finish_session(&self, view: &SessionView) -> Result<PhaseOutcome, SessionError> {
        let task_id = view.session.task_id.clone();
        let iterations = view.session.total_iterations;

        self.db
            .mark_task_pomodoro_completed(&task_id, iterations)
            .await
            .map_err(SessionError::storage("record completed pomodoros"))?;
        self.db
            .delete_session()
            .await
            .map_err(SessionError::storage("delete finished session"))?;

        self.state.lock().await.cancel();
        self.emit_state_changed().await;

        log_info!("Pomodoro session for task {task_id} finished ({iterations} iterations)");
        self.notifier.session_finished(&task_id, iterations).await;

        Ok(PhaseOutcome::Finished {
            task_id,
            iterations,
        })
    }

    /// A write failed. Keep ticking only if the row is still there;
    /// otherwise drop to idle rather than count down a ghost session.
    async fn recover_after_failed_write(&self, was_running: bool) {
        match self.db.get_active_session().await {
            Ok(Some(_)) => {
                if was_running {
                    self.state.lock().await.resume();
                    self.spawn_ticker().await;
                }
            }
            Ok(None) => {
                log_warn!("Session row vanished after a failed write; going idle");
                self.state.lock().await.cancel();
                self.emit_state_changed().await;
            }
            Err(err) => {
                log_error!("Could not re-check session after a failed write: {err}");
                self.freeze_and_emit().await;
            }
        }
    }

    async fn freeze_and_emit(&self) {
        self.state.lock().await.freeze();
        self.emit_state_changed().await;
    }

    /// Stop ticking and drop the ticker. Call before discarding the last
    /// clone of the controller.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
    }

    /// Boxed: the ticker spawns phase completion, which can start a new
    /// ticker, and the future type needs a name to close that loop.
    fn spawn_ticker(&self) -> TickerFuture<'_> {
        Box::pin(async move {
            let mut ticker_guard = self.ticker.lock().await;
            let generation = {
                let mut state = self.state.lock().await;
                state.generation = state.generation.wrapping_add(1);
                state.generation
            };
            if let Some(previous) = ticker_guard.take() {
                previous.cancel_token.cancel();
                previous.handle.abort();
            }

            let cancel_token = CancellationToken::new();
            let controller = self.clone();
            let token_clone = cancel_token.clone();
            let handle = tokio::spawn(async move {
                controller.run_ticker(generation, token_clone).await;
            });

            *ticker_guard = Some(Ticker {
                handle,
                cancel_token,
            });
        })
    }

    async fn cancel_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        {
            let mut state = self.state.lock().await;
            state.generation = state.generation.wrapping_add(1);
        }
        if let Some(ticker) = ticker_guard.take() {
            ticker.cancel_token.cancel();
            ticker.handle.abort();
        }
    }

    async fn run_ticker(self, generation: u64, cancel_token: CancellationToken) {
        let mut interval = time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancel_token.cancelled() => break,
            }

            // The heartbeat write happens under the state lock so a
            // concurrent pause cannot have its write overtaken by ours.
            let mut state = self.state.lock().await;
            if state.generation != generation {
                break;
            }

            match state.tick() {
                TickOutcome::Skipped => break,
                TickOutcome::Ticked { remaining_seconds } => {
                    self.notifier.state_changed(&TimerSnapshot::from(&*state));
                    ticks = ticks.wrapping_add(1);
                    if ticks % self.heartbeat_every_ticks == 0 {
                        if let Err(err) = self.db.update_session_timer(remaining_seconds, false).await {
                            log_warn!("Heartbeat write failed: {err}");
                        }
                    }
                }
                TickOutcome::Expired => {
                    self.notifier.state_changed(&TimerSnapshot::from(&*state));
                    drop(state);

                    let controller = self.clone();
                    tokio::spawn(async move {
                        let _ = controller.complete_phase(Some(generation)).await;
                    });
                    break;
                }
            }
        }
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.snapshot().await;
        self.notifier.state_changed(&snapshot);
    }
}
