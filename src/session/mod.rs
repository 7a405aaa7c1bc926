//! Session-scoped state: the storage slot abstraction and the store of
//! posts drafted locally during the session.

mod error;
mod local_store;
mod storage;

pub use local_store::{LocalPostStore, StoreEvent};
pub use storage::{MemorySessionStorage, SessionStorage, SqliteSessionStorage};
