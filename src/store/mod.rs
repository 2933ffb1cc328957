mod rows;
mod sqlite;

pub use rows::{NewQueueRow, QueueCounts, QueueRow, RecordRow};
pub use sqlite::{LocalStore, FATAL_MARKER};
