pub mod error;
pub mod glob;
pub mod key_codec;
pub mod local_store;
pub mod types;

pub use error::{CacheError, Result};
pub use glob::GlobMatcher;
pub use key_codec::KeyCodec;
pub use local_store::LocalStore;
pub use types::{BackendKind, BackendState, LocalStats, LocalStoreConfig, StoredValue};
