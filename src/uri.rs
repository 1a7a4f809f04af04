use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Scheme prefix of URIs indexed in the model registry.
pub const MODEL_REGISTRY_SCHEME: &str = "model-registry://";

/// A parsed `model-registry://{registeredModelName}[/{versionName}]` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUri {
    registered_model_name: String,
    version_name: Option<String>,
}

impl RegistryUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix(MODEL_REGISTRY_SCHEME)
            .ok_or_else(|| Error::MalformedUri(raw.to_string()))?;

        if rest.is_empty() {
            return Err(Error::MalformedUri(raw.to_string()));
        }

        let (model, version) = match rest.split_once('/') {
            Some((model, version)) => (model, Some(version)),
            None => (rest, None),
        };

        if model.is_empty() {
            return Err(Error::MalformedUri(raw.to_string()));
        }

        Ok(Self {
            registered_model_name: model.to_string(),
            version_name: version.filter(|v| !v.is_empty()).map(str::to_string),
        })
    }

    pub fn registered_model_name(&self) -> &str {
        &self.registered_model_name
    }

    pub fn version_name(&self) -> Option<&str> {
        self.version_name.as_deref()
    }
}

impl FromStr for RegistryUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RegistryUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MODEL_REGISTRY_SCHEME, self.registered_model_name)?;
        if let Some(version) = &self.version_name {
            write!(f, "/{}", version)?;
        }
        Ok(())
    }
}
