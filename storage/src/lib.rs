pub mod store;
pub mod wal;

pub use store::{MemoryStore, RankingStore, StoreError, WalStore};
pub use wal::{Wal, WalError};
