//! Resolve-and-delegate pipeline for `model-registry://` URIs.
//!
//! The registry URI is parsed, the registered model, version and artifact are
//! looked up, and the artifact URI is handed to the downloader registered for
//! its protocol. The first failing stage aborts the whole download.

use crate::config::{Config, Transport};
use crate::downloader::{Downloader, DownloaderRegistry};
use crate::error::Result;
use crate::protocol::{ProtocolToken, SupportedProtocols};
use crate::registry::{
    CatalogRegistry, ModelArtifact, ModelVersion, RegisteredModel, RegistryClient,
    RestRegistryClient,
};
use crate::resolver;
use crate::uri::{RegistryUri, MODEL_REGISTRY_SCHEME};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Everything the pipeline learned about a registry URI before downloading.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub uri: RegistryUri,
    pub model: RegisteredModel,
    pub version: ModelVersion,
    pub artifact: ModelArtifact,
    pub protocol: ProtocolToken,
}

impl Resolution {
    /// `<model>` or `<model>-<version>` when the resolved version is named.
    pub fn model_name(&self) -> String {
        effective_model_name(self.uri.registered_model_name(), self.version.name.as_deref())
    }

    pub fn storage_uri(&self) -> &str {
        self.artifact.uri.as_deref().unwrap_or_default()
    }
}

fn effective_model_name(registered_model_name: &str, version_name: Option<&str>) -> String {
    match version_name.filter(|v| !v.is_empty()) {
        Some(version) => format!("{}-{}", registered_model_name, version),
        None => registered_model_name.to_string(),
    }
}

pub struct ModelRegistryDownloader {
    client: Arc<dyn RegistryClient>,
    protocols: SupportedProtocols,
    downloaders: DownloaderRegistry,
}

impl ModelRegistryDownloader {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        protocols: SupportedProtocols,
        downloaders: DownloaderRegistry,
    ) -> Self {
        Self {
            client,
            protocols,
            downloaders,
        }
    }

    /// Opens the configured registry transport and registers the built-in downloaders.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client: Arc<dyn RegistryClient> = match &config.transport {
            Transport::Rest => Arc::new(RestRegistryClient::connect(&config.registry).await?),
            Transport::Catalog(path) => Arc::new(CatalogRegistry::load(path)?),
        };

        Ok(Self::new(
            client,
            SupportedProtocols::default(),
            DownloaderRegistry::with_builtin(config),
        ))
    }

    /// Token under which this downloader can be registered in another registry.
    pub fn protocol() -> ProtocolToken {
        ProtocolToken::builtin(MODEL_REGISTRY_SCHEME)
    }

    pub fn downloaders_mut(&mut self) -> &mut DownloaderRegistry {
        &mut self.downloaders
    }

    /// Looks up the artifact backing `registry_uri` without transferring anything.
    pub async fn resolve(&self, registry_uri: &str) -> Result<Resolution> {
        let uri = RegistryUri::parse(registry_uri)?;

        let model = self
            .client
            .get_registered_model_by_name(uri.registered_model_name())
            .await?;
        tracing::debug!("Resolved registered model {} ({})", model.name, model.id);

        let version =
            resolver::resolve_version(self.client.as_ref(), &model, uri.version_name()).await?;
        let artifact = resolver::resolve_artifact(self.client.as_ref(), &version).await?;
        let protocol = self
            .protocols
            .extract(artifact.uri.as_deref().unwrap_or_default())?;

        tracing::info!(
            "Model {} resolved to version {} artifact {} ({})",
            model.name,
            version.id,
            artifact.id,
            protocol
        );

        Ok(Resolution {
            uri,
            model,
            version,
            artifact,
            protocol,
        })
    }

    /// Resolves `registry_uri` and hands the artifact to its protocol downloader.
    ///
    /// `requested_model_name` is only logged: the target folder is named after
    /// the registered model and the resolved version.
    pub async fn download(
        &self,
        dest_dir: &Path,
        requested_model_name: &str,
        registry_uri: &str,
    ) -> Result<Resolution> {
        tracing::info!(
            "Download model indexed in model registry: modelName={}, storageUri={}, modelDir={:?}",
            requested_model_name,
            registry_uri,
            dest_dir
        );

        let resolution = self.resolve(registry_uri).await?;
        let downloader = self.downloaders.get(&resolution.protocol)?;
        let model_name = resolution.model_name();

        downloader
            .download(dest_dir, &model_name, resolution.storage_uri())
            .await?;

        tracing::info!("Model {} downloaded to {:?}", model_name, dest_dir);
        Ok(resolution)
    }
}

#[async_trait]
impl Downloader for ModelRegistryDownloader {
    async fn download(&self, dest_dir: &Path, model_name: &str, storage_uri: &str) -> Result<()> {
        ModelRegistryDownloader::download(self, dest_dir, model_name, storage_uri)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDownloader {
        calls: Mutex<Vec<(PathBuf, String, String)>>,
    }

    #[async_trait]
    impl Downloader for RecordingDownloader {
        async fn download(&self, dest_dir: &Path, model_name: &str, storage_uri: &str) -> Result<()> {
            self.calls.lock().unwrap().push((
                dest_dir.to_path_buf(),
                model_name.to_string(),
                storage_uri.to_string(),
            ));
            Ok(())
        }
    }

    struct FailingDownloader;

    #[async_trait]
    impl Downloader for FailingDownloader {
        async fn download(&self, _: &Path, _: &str, storage_uri: &str) -> Result<()> {
            Err(Error::download(format!("{} is gone", storage_uri)))
        }
    }

    fn version(id: &str, name: Option<&str>, create_time: i64) -> ModelVersion {
        ModelVersion {
            id: id.to_string(),
            name: name.map(str::to_string),
            create_time,
        }
    }

    fn artifact(id: &str, uri: &str, create_time: i64) -> ModelArtifact {
        ModelArtifact {
            id: id.to_string(),
            uri: Some(uri.to_string()),
            create_time,
            artifact_type: Some(ModelArtifact::MODEL_ARTIFACT_TYPE.to_string()),
        }
    }

    fn sklearn_iris() -> CatalogRegistry {
        let mut catalog = CatalogRegistry::new();
        catalog
            .add_model("1", "sklearn-iris")
            .add_version("1", version("10", None, 10))
            .add_version("1", version("20", Some("v2"), 20))
            .add_artifact("10", artifact("100", "s3://bucket/v1/model.joblib", 10))
            .add_artifact("20", artifact("200", "s3://bucket/old.joblib", 15))
            .add_artifact("20", artifact("201", "s3://bucket/model.joblib", 25));
        catalog
    }

    fn orchestrator(
        catalog: CatalogRegistry,
        s3: Arc<RecordingDownloader>,
    ) -> ModelRegistryDownloader {
        let mut downloaders = DownloaderRegistry::new();
        downloaders.register_instance(ProtocolToken::new("s3://").unwrap(), s3);
        ModelRegistryDownloader::new(Arc::new(catalog), SupportedProtocols::default(), downloaders)
    }

    #[tokio::test]
    async fn latest_version_is_downloaded_under_versioned_name() {
        let s3 = Arc::new(RecordingDownloader::default());
        let orchestrator = orchestrator(sklearn_iris(), s3.clone());

        orchestrator
            .download(Path::new("/tmp/out"), "", "model-registry://sklearn-iris")
            .await
            .unwrap();

        let calls = s3.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(
                PathBuf::from("/tmp/out"),
                "sklearn-iris-v2".to_string(),
                "s3://bucket/model.joblib".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn unnamed_version_uses_bare_model_name() {
        let mut catalog = CatalogRegistry::new();
        catalog
            .add_model("1", "iris")
            .add_version("1", version("10", None, 10))
            .add_artifact("10", artifact("100", "s3://bucket/iris.joblib", 10));
        let s3 = Arc::new(RecordingDownloader::default());

        let resolution = orchestrator(catalog, s3.clone())
            .download(Path::new("/models"), "ignored", "model-registry://iris")
            .await
            .unwrap();

        assert_eq!(resolution.model_name(), "iris");
        assert_eq!(s3.calls.lock().unwrap()[0].1, "iris");
    }

    #[tokio::test]
    async fn explicit_version_wins_over_recency() {
        let mut catalog = sklearn_iris();
        catalog
            .add_version("1", version("5", Some("v1"), 5))
            .add_artifact("5", artifact("50", "s3://bucket/v1-explicit.joblib", 5));
        let s3 = Arc::new(RecordingDownloader::default());

        let resolution = orchestrator(catalog, s3)
            .resolve("model-registry://sklearn-iris/v1")
            .await
            .unwrap();

        assert_eq!(resolution.version.id, "5");
        assert_eq!(resolution.storage_uri(), "s3://bucket/v1-explicit.joblib");
        assert_eq!(resolution.model_name(), "sklearn-iris-v1");
    }

    #[tokio::test]
    async fn stage_failures_abort_before_download() {
        let s3 = Arc::new(RecordingDownloader::default());
        let orchestrator = orchestrator(sklearn_iris(), s3.clone());
        let dest = Path::new("/tmp/out");

        assert!(matches!(
            orchestrator.download(dest, "", "model-registry://").await,
            Err(Error::MalformedUri(_))
        ));
        assert!(matches!(
            orchestrator.download(dest, "", "model-registry://unknown").await,
            Err(Error::ModelNotFound(_))
        ));
        assert!(matches!(
            orchestrator
                .download(dest, "", "model-registry://sklearn-iris/v9")
                .await,
            Err(Error::VersionNotFound { .. })
        ));
        assert!(s3.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn protocol_errors_are_typed() {
        let mut catalog = CatalogRegistry::new();
        catalog
            .add_model("1", "ftp-model")
            .add_version("1", version("10", None, 10))
            .add_artifact("10", artifact("100", "ftp://host/x", 10))
            .add_model("2", "gcs-model")
            .add_version("2", version("20", None, 10))
            .add_artifact("20", artifact("200", "gs://bucket/x", 10))
            .add_model("3", "bare-model")
            .add_version("3", version("30", None, 10))
            .add_artifact("30", artifact("300", "bucket/x", 10));
        let orchestrator = orchestrator(catalog, Arc::new(RecordingDownloader::default()));
        let dest = Path::new("/tmp/out");

        assert!(matches!(
            orchestrator.download(dest, "", "model-registry://ftp-model").await,
            Err(Error::UnsupportedProtocol(_))
        ));
        assert!(matches!(
            orchestrator.download(dest, "", "model-registry://gcs-model").await,
            Err(Error::UnconfiguredProtocol(_))
        ));
        assert!(matches!(
            orchestrator.download(dest, "", "model-registry://bare-model").await,
            Err(Error::MissingProtocol(_))
        ));
    }

    #[tokio::test]
    async fn downloader_failure_is_returned_unchanged() {
        let mut downloaders = DownloaderRegistry::new();
        downloaders.register_instance(
            ProtocolToken::new("s3://").unwrap(),
            Arc::new(FailingDownloader),
        );
        let orchestrator = ModelRegistryDownloader::new(
            Arc::new(sklearn_iris()),
            SupportedProtocols::default(),
            downloaders,
        );

        match orchestrator
            .download(Path::new("/tmp/out"), "", "model-registry://sklearn-iris")
            .await
        {
            Err(Error::DownloadFailed(msg)) => assert!(msg.contains("s3://bucket/model.joblib")),
            other => panic!("expected DownloadFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn downloader_is_built_once_across_downloads() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let mut downloaders = DownloaderRegistry::new();
        downloaders.register(
            ProtocolToken::new("s3://").unwrap(),
            Arc::new(move || -> Result<Arc<dyn Downloader>> {
                counter.fetch_add(1, Ordering::SeqCst);
                let downloader: Arc<dyn Downloader> = Arc::new(RecordingDownloader::default());
                Ok(downloader)
            }),
        );
        let orchestrator = ModelRegistryDownloader::new(
            Arc::new(sklearn_iris()),
            SupportedProtocols::default(),
            downloaders,
        );

        for _ in 0..3 {
            orchestrator
                .download(Path::new("/tmp/out"), "", "model-registry://sklearn-iris")
                .await
                .unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registry_downloader_nests_as_a_protocol() {
        let s3 = Arc::new(RecordingDownloader::default());
        let inner: Arc<dyn Downloader> = Arc::new(orchestrator(sklearn_iris(), s3.clone()));

        let mut outer = DownloaderRegistry::new();
        outer.register_instance(ModelRegistryDownloader::protocol(), inner);
        outer
            .get(&ModelRegistryDownloader::protocol())
            .unwrap()
            .download(Path::new("/mnt/models"), "", "model-registry://sklearn-iris/v2")
            .await
            .unwrap();

        assert_eq!(s3.calls.lock().unwrap()[0].1, "sklearn-iris-v2");
    }

    #[test]
    fn effective_name_rules() {
        assert_eq!(effective_model_name("iris", None), "iris");
        assert_eq!(effective_model_name("iris", Some("v2")), "iris-v2");
        assert_eq!(effective_model_name("iris", Some("")), "iris");
    }
}
