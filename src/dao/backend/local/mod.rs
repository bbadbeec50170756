mod kv;
mod store;

pub use kv::LocalKvStore;
pub use store::{DEFAULT_NAMESPACE, LocalBackend};
