//! Resolve `model-registry://` URIs to the artifact they point at and hand
//! the transfer to the downloader registered for the artifact's protocol.

pub mod config;
pub mod downloader;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod uri;

pub use config::Config;
pub use downloader::{Downloader, DownloaderRegistry};
pub use error::{Error, Result};
pub use orchestrator::{ModelRegistryDownloader, Resolution};
pub use protocol::{ProtocolToken, SupportedProtocols};
pub use registry::RegistryClient;
pub use uri::RegistryUri;
