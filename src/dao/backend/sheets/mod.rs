mod config;
mod error;
mod models;
mod oauth;
mod store;

pub use config::{OAuthConfig, SheetsConfig};
pub use error::SheetsDaoError;
pub use store::RemoteBackend;
