pub mod sessions;
pub mod tasks;
