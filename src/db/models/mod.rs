pub mod session;
pub mod task;

pub use session::{
    BreakType, PomodoroSession, SessionConfig, SessionUpdate, SessionView, TimerType,
    LONG_BREAK_SECS, SESSION_ROW_ID, SHORT_BREAK_SECS,
};
pub use task::{Subtask, Task};
