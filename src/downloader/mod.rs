//! Protocol downloaders and the registry that hands them out.
//!
//! A [`Downloader`] moves the bytes behind a storage URI into a local
//! directory. [`DownloaderRegistry`] maps each [`ProtocolToken`] to a factory
//! and builds at most one downloader per token, on first use.

pub mod http;
pub mod local;

pub use http::HttpDownloader;
pub use local::LocalDownloader;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::ProtocolToken;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetches `storage_uri` into `dest_dir`, under a folder named `model_name`.
    async fn download(&self, dest_dir: &Path, model_name: &str, storage_uri: &str) -> Result<()>;
}

pub type DownloaderFactory = Arc<dyn Fn() -> Result<Arc<dyn Downloader>> + Send + Sync>;

/// Directory a downloader writes `model_name` into.
pub fn model_dir(dest_dir: &Path, model_name: &str) -> PathBuf {
    if model_name.is_empty() {
        dest_dir.to_path_buf()
    } else {
        dest_dir.join(model_name)
    }
}

pub struct DownloaderRegistry {
    factories: HashMap<ProtocolToken, DownloaderFactory>,
    cache: Mutex<HashMap<ProtocolToken, Arc<dyn Downloader>>>,
}

impl DownloaderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with the downloaders this crate ships: http(s), file and pvc.
    pub fn with_builtin(config: &Config) -> Self {
        let mut registry = Self::new();

        let connect_timeout = config.registry.connect_timeout;
        let download_timeout = config.download_timeout;
        let http: DownloaderFactory = Arc::new(move || -> Result<Arc<dyn Downloader>> {
            let downloader: Arc<dyn Downloader> =
                Arc::new(HttpDownloader::new(connect_timeout, download_timeout)?);
            Ok(downloader)
        });
        registry.register(ProtocolToken::builtin(ProtocolToken::HTTP), http.clone());
        registry.register(ProtocolToken::builtin(ProtocolToken::HTTPS), http);

        let pvc_root = config.pvc_root.clone();
        let local: DownloaderFactory = Arc::new(move || -> Result<Arc<dyn Downloader>> {
            let downloader: Arc<dyn Downloader> = Arc::new(LocalDownloader::new(pvc_root.clone()));
            Ok(downloader)
        });
        registry.register(ProtocolToken::builtin(ProtocolToken::FILE), local.clone());
        registry.register(ProtocolToken::builtin(ProtocolToken::PVC), local);

        registry
    }

    pub fn register(&mut self, protocol: ProtocolToken, factory: DownloaderFactory) -> &mut Self {
        self.cache_guard().remove(&protocol);
        self.factories.insert(protocol, factory);
        self
    }

    /// Registers an already built downloader; every lookup returns this instance.
    pub fn register_instance(
        &mut self,
        protocol: ProtocolToken,
        downloader: Arc<dyn Downloader>,
    ) -> &mut Self {
        self.register(protocol, Arc::new(move || -> Result<Arc<dyn Downloader>> {
            Ok(downloader.clone())
        }))
    }

    pub fn is_configured(&self, protocol: &ProtocolToken) -> bool {
        self.factories.contains_key(protocol)
    }

    pub fn is_cached(&self, protocol: &ProtocolToken) -> bool {
        self.cache_guard().contains_key(protocol)
    }

    /// Returns the downloader for `protocol`, building and caching it on first use.
    pub fn get(&self, protocol: &ProtocolToken) -> Result<Arc<dyn Downloader>> {
        let mut cache = self.cache_guard();
        if let Some(downloader) = cache.get(protocol) {
            return Ok(downloader.clone());
        }

        let factory = self
            .factories
            .get(protocol)
            .ok_or_else(|| Error::UnconfiguredProtocol(protocol.to_string()))?;

        tracing::debug!("Creating downloader for protocol {}", protocol);
        let downloader = factory()?;
        cache.insert(protocol.clone(), downloader.clone());
        Ok(downloader)
    }

    // Factories never panic while the lock is held, so a poisoned map is still consistent.
    fn cache_guard(&self) -> std::sync::MutexGuard<'_, HashMap<ProtocolToken, Arc<dyn Downloader>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for DownloaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DownloaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut configured: Vec<_> = self.factories.keys().map(ProtocolToken::as_str).collect();
        configured.sort_unstable();
        f.debug_struct("DownloaderRegistry")
            .field("configured", &configured)
            .finish()
    }
}
