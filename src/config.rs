use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const TRANSPORT_ENV: &str = "MODEL_REGISTRY_TRANSPORT";
pub const BASE_URL_ENV: &str = "MODEL_REGISTRY_BASE_URL";
pub const SCHEME_ENV: &str = "MODEL_REGISTRY_SCHEME";
pub const API_PATH_ENV: &str = "MODEL_REGISTRY_API_PATH";
pub const CATALOG_ENV: &str = "MODEL_REGISTRY_CATALOG";
pub const CONNECT_TIMEOUT_ENV: &str = "MODEL_REGISTRY_CONNECT_TIMEOUT_SECS";
pub const REQUEST_TIMEOUT_ENV: &str = "MODEL_REGISTRY_REQUEST_TIMEOUT_SECS";
pub const PVC_ROOT_ENV: &str = "MODEL_REGISTRY_PVC_ROOT";
pub const DOWNLOAD_TIMEOUT_ENV: &str = "MODEL_REGISTRY_DOWNLOAD_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "localhost:8080";
const DEFAULT_SCHEME: &str = "http";
const DEFAULT_API_PATH: &str = "/api/model_registry/v1alpha3";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PVC_ROOT: &str = "/mnt/pvc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
	Rest,
	Catalog(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
	pub scheme: String,
	pub base_url: String,
	pub api_path: String,
	pub connect_timeout: Duration,
	pub request_timeout: Duration,
}

impl RegistryConfig {
	pub fn api_base(&self) -> String {
		let base = self.base_url.trim_end_matches('/');
		let base = if base.contains("://") {
			base.to_string()
		} else {
			format!("{}://{}", self.scheme, base)
		};
		format!("{}/{}", base, self.api_path.trim_matches('/'))
	}
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			scheme: DEFAULT_SCHEME.to_string(),
			base_url: DEFAULT_BASE_URL.to_string(),
			api_path: DEFAULT_API_PATH.to_string(),
			connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
			request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub transport: Transport,
	pub registry: RegistryConfig,
	pub pvc_root: PathBuf,
	/// Overall deadline for one artifact transfer. `None` means no limit.
	pub download_timeout: Option<Duration>,
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds a config from `lookup`; unset and empty values take the default.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

		let scheme = get(SCHEME_ENV).unwrap_or_else(|| DEFAULT_SCHEME.to_string());
		if scheme != "http" && scheme != "https" {
			return Err(Error::config(format!(
				"{} must be http or https, got '{}'",
				SCHEME_ENV, scheme
			)));
		}

		let registry = RegistryConfig {
			scheme,
			base_url: get(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
			api_path: get(API_PATH_ENV).unwrap_or_else(|| DEFAULT_API_PATH.to_string()),
			connect_timeout: secs(
				CONNECT_TIMEOUT_ENV,
				get(CONNECT_TIMEOUT_ENV),
				DEFAULT_CONNECT_TIMEOUT_SECS,
			)?,
			request_timeout: secs(
				REQUEST_TIMEOUT_ENV,
				get(REQUEST_TIMEOUT_ENV),
				DEFAULT_REQUEST_TIMEOUT_SECS,
			)?,
		};

		let transport = match get(TRANSPORT_ENV).as_deref() {
			None | Some("rest") => Transport::Rest,
			Some("catalog") => {
				let path = get(CATALOG_ENV).ok_or_else(|| {
					Error::config(format!("{} is required for the catalog transport", CATALOG_ENV))
				})?;
				Transport::Catalog(PathBuf::from(path))
			}
			Some(other) => {
				return Err(Error::config(format!(
					"unknown {} '{}', expected rest or catalog",
					TRANSPORT_ENV, other
				)))
			}
		};

		let pvc_root = get(PVC_ROOT_ENV)
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_PVC_ROOT));

		let download_timeout = match get(DOWNLOAD_TIMEOUT_ENV) {
			Some(v) => Some(secs(DOWNLOAD_TIMEOUT_ENV, Some(v), 0)?),
			None => None,
		};

		Ok(Self {
			transport,
			registry,
			pvc_root,
			download_timeout,
		})
	}
}

fn secs(key: &str, value: Option<String>, default: u64) -> Result<Duration> {
	match value {
		None => Ok(Duration::from_secs(default)),
		Some(v) => v
			.trim()
			.parse::<u64>()
			.map(Duration::from_secs)
			.map_err(|e| Error::config(format!("{} must be a number of seconds: {}", key, e))),
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			transport: Transport::Rest,
			registry: RegistryConfig::default(),
			pvc_root: PathBuf::from(DEFAULT_PVC_ROOT),
			download_timeout: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
		let env: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		Config::from_lookup(|key| env.get(key).cloned())
	}

	#[test]
	fn defaults_when_environment_is_empty() {
		let config = config_from(&[]).unwrap();
		assert_eq!(config, Config::default());
		assert_eq!(
			config.registry.api_base(),
			"http://localhost:8080/api/model_registry/v1alpha3"
		);
	}

	#[test]
	fn empty_values_fall_back_to_defaults() {
		let config = config_from(&[(BASE_URL_ENV, ""), (CONNECT_TIMEOUT_ENV, " ")]).unwrap();
		assert_eq!(config.registry.base_url, DEFAULT_BASE_URL);
		assert_eq!(config.registry.connect_timeout, Duration::from_secs(30));
	}

	#[test]
	fn reads_overrides() {
		let config = config_from(&[
			(BASE_URL_ENV, "registry.svc:9443"),
			(SCHEME_ENV, "https"),
			(REQUEST_TIMEOUT_ENV, "5"),
		])
		.unwrap();
		assert_eq!(
			config.registry.api_base(),
			"https://registry.svc:9443/api/model_registry/v1alpha3"
		);
		assert_eq!(config.registry.request_timeout, Duration::from_secs(5));
	}

	#[test]
	fn base_url_with_scheme_is_kept() {
		let registry = RegistryConfig {
			base_url: "http://127.0.0.1:1234/".to_string(),
			api_path: "api/v1/".to_string(),
			..RegistryConfig::default()
		};
		assert_eq!(registry.api_base(), "http://127.0.0.1:1234/api/v1");
	}

	#[test]
	fn catalog_transport_requires_a_path() {
		assert!(matches!(
			config_from(&[(TRANSPORT_ENV, "catalog")]),
			Err(Error::Config(_))
		));

		let config = config_from(&[(TRANSPORT_ENV, "catalog"), (CATALOG_ENV, "/etc/catalog.toml")]).unwrap();
		assert_eq!(config.transport, Transport::Catalog(PathBuf::from("/etc/catalog.toml")));
	}

	#[test]
	fn download_timeout_is_unbounded_unless_set() {
		let config = config_from(&[(REQUEST_TIMEOUT_ENV, "5")]).unwrap();
		assert_eq!(config.download_timeout, None);

		let config = config_from(&[(DOWNLOAD_TIMEOUT_ENV, "3600")]).unwrap();
		assert_eq!(config.download_timeout, Some(Duration::from_secs(3600)));
		assert_eq!(config.registry.request_timeout, Duration::from_secs(60));

		assert!(config_from(&[(DOWNLOAD_TIMEOUT_ENV, "forever")]).is_err());
	}

	#[test]
	fn rejects_bad_values() {
		assert!(config_from(&[(TRANSPORT_ENV, "grpc")]).is_err());
		assert!(config_from(&[(SCHEME_ENV, "ftp")]).is_err());
		assert!(config_from(&[(CONNECT_TIMEOUT_ENV, "soon")]).is_err());
	}
}
