pub mod controller;
pub mod facade;
pub mod state;
pub mod transitions;

pub use controller::{AppLifecycle, PhaseOutcome, TimerController, TimerSnapshot};
pub use facade::SessionFacade;
pub use state::{TimerState, TimerStatus};
