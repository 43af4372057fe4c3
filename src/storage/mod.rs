pub mod database;
pub mod history;
pub mod journal;
pub mod lock;
pub mod state_store;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use history::RunHistory;
pub use journal::{JournalEntry, JournalOp, PublishJournal};
pub use lock::{LockInfo, RootLock};
pub use state_store::{StateSnapshot, StateStore};
