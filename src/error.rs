use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid model registry URI '{0}', use like model-registry://{{registeredModelName}}/{{versionName}}")]
	MalformedUri(String),

	#[error("registered model not found: {0}")]
	ModelNotFound(String),

	#[error("model version '{version}' not found for registered model {model_id}")]
	VersionNotFound { version: String, model_id: String },

	#[error("no versions associated to registered model {0}")]
	NoVersionsFound(String),

	#[error("no model artifacts associated to model version {0}")]
	NoArtifactsFound(String),

	#[error("model artifact {artifact_id} has empty URI")]
	EmptyArtifactUri { artifact_id: String },

	#[error("there is no protocol specified for the storage URI '{0}'")]
	MissingProtocol(String),

	#[error("protocol {0} not supported for storage URI")]
	UnsupportedProtocol(String),

	#[error("no downloader configured for protocol {0}")]
	UnconfiguredProtocol(String),

	#[error("download failed: {0}")]
	DownloadFailed(String),

	#[error("model registry request failed: {0}")]
	Transport(#[from] reqwest::Error),

	#[error("model registry returned {status}: {message}")]
	Registry { status: u16, message: String },

	#[error("configuration error: {0}")]
	Config(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl Error {
	pub fn download(msg: impl Into<String>) -> Self {
		Self::DownloadFailed(msg.into())
	}

	pub fn config(msg: impl Into<String>) -> Self {
		Self::Config(msg.into())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::Serialization(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
