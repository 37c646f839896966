pub mod event_bus;
pub mod kv_store;

pub use event_bus::{EventBus, JobEvent};
pub use kv_store::{get_as, set_as, JsonFileStore, KvStore, MemoryStore};
