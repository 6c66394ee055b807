mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    BreakType, PomodoroSession, SessionConfig, SessionUpdate, SessionView, Subtask, Task,
    TimerType,
};

#[cfg(test)]
pub(crate) fn test_database() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = Database::new(dir.path().join("pomotask.sqlite3")).expect("open database");
    (dir, db)
}
