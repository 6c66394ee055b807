//! Prompts and state updates sent from the session core to whatever is
//! presenting it (a UI, a CLI, a test).

use async_trait::async_trait;
use log::{error, info};
use serde::Serialize;

use crate::db::models::BreakType;
use crate::timer::TimerSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PhasePrompt {
    /// A work phase finished; the break is ready to start.
    StartBreak {
        break_type: BreakType,
        completed_iteration: u32,
        total_iterations: u32,
    },
    /// A break finished; the next work phase is ready to start.
    ResumeWork {
        iteration: u32,
        total_iterations: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptAction {
    Continue,
    Dismiss,
}

#[async_trait]
pub trait SessionNotifier: Send + Sync {
    /// Ask whether to start the next phase right away. `Dismiss` leaves the
    /// timer frozen until it is resumed.
    async fn prompt_phase_complete(&self, prompt: PhasePrompt) -> PromptAction;

    /// Confirm a destructive cancel.
    async fn confirm_cancel(&self) -> bool;

    async fn session_finished(&self, task_id: &str, iterations: u32);

    async fn report_error(&self, message: &str);

    /// Countdown display hook; called on every tick and state change.
    fn state_changed(&self, _snapshot: &TimerSnapshot) {}
}

/// Headless notifier that only logs. Phase prompts are answered with a
/// fixed action.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    phase_action: PromptAction,
    confirm_cancel: bool,
}

impl LogNotifier {
    pub fn new(phase_action: PromptAction, confirm_cancel: bool) -> Self {
        Self {
            phase_action,
            confirm_cancel,
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(PromptAction::Dismiss, true)
    }
}

#[async_trait]
impl SessionNotifier for LogNotifier {
    async fn prompt_phase_complete(&self, prompt: PhasePrompt) -> PromptAction {
        info!("Phase complete: {prompt:?}, answering {:?}", self.phase_action);
        self.phase_action
    }

    async fn confirm_cancel(&self) -> bool {
        self.confirm_cancel
    }

    async fn session_finished(&self, task_id: &str, iterations: u32) {
        info!("Pomodoro session for task {task_id} finished after {iterations} iterations");
    }

    async fn report_error(&self, message: &str) {
        error!("Pomodoro session error: {message}");
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_answers_with_its_configured_action() {
        let notifier = LogNotifier::new(PromptAction::Continue, false);
        let prompt = PhasePrompt::ResumeWork {
            iteration: 2,
            total_iterations: 4,
        };

        assert_eq!(notifier.prompt_phase_complete(prompt).await, PromptAction::Continue);
        assert!(!notifier.confirm_cancel().await);
        assert_eq!(
            LogNotifier::default()
                .prompt_phase_complete(PhasePrompt::StartBreak {
                    break_type: BreakType::Long,
                    completed_iteration: 1,
                    total_iterations: 1,
                })
                .await,
            PromptAction::Dismiss
        );
    }
}
