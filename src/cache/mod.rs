//! Cache proxy: generation-scoped storage of the application shell and of
//! metadata responses, fronting all network access of the client.

pub mod actor;
pub mod manifest;
pub mod messages;
pub mod store;
pub mod transport;

pub use actor::{CacheProxy, CacheProxyHandle, ProxySettings};
pub use manifest::{AssetManifest, DEFAULT_ASSETS};
pub use messages::{CacheCommand, CacheStatus, ForegroundMessage, ProxyResponse, ServedFrom};
pub use store::{request_key, CacheStore};
pub use transport::ProxiedTransport;
