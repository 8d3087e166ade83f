pub mod client;
#[cfg(any(test, feature = "conformance"))]
pub mod conformance;
pub mod context;
pub mod error;
pub mod memory;
pub mod path;
pub mod record;
pub mod redb;
pub mod traits;

pub use client::Client;
pub use context::Context;
pub use error::{ErrorKind, KVError};
pub use memory::MemoryStore;
pub use path::{DEFAULT_SEPARATOR, Path, PathConfig, WILDCARD, is_dynamic, join, trim_dynamic};
pub use record::{KeyValue, KeyValueList, kv};
pub use redb::RedbStore;
pub use traits::Store;
