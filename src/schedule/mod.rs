pub mod entry;
pub mod store;
pub mod scheduler;

pub use entry::{RescanEntry, RescanOutcome};
pub use store::{MemoryStore, RescanStore, SqliteStore};
pub use scheduler::RescanScheduler;
