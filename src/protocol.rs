//! Storage URI protocol tokens.
//!
//! A protocol token is the scheme of a storage URI including the `://`
//! separator, e.g. `s3://`. Tokens are matched on the whole scheme, so
//! `s3a://bucket` never resolves to `s3://` even when both are supported.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

const SCHEME_SEPARATOR: &str = "://";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolToken(String);

impl ProtocolToken {
    pub const S3: &'static str = "s3://";
    pub const GCS: &'static str = "gs://";
    pub const PVC: &'static str = "pvc://";
    pub const FILE: &'static str = "file://";
    pub const HDFS: &'static str = "hdfs://";
    pub const WEBHDFS: &'static str = "webhdfs://";
    pub const HTTP: &'static str = "http://";
    pub const HTTPS: &'static str = "https://";

    /// Builds a token from either `scheme` or `scheme://`.
    pub fn new(raw: &str) -> Result<Self> {
        let scheme = raw.strip_suffix(SCHEME_SEPARATOR).unwrap_or(raw);
        if !is_valid_scheme(scheme) {
            return Err(Error::config(format!("invalid protocol token '{}'", raw)));
        }
        Ok(Self(format!(
            "{}{}",
            scheme.to_ascii_lowercase(),
            SCHEME_SEPARATOR
        )))
    }

    /// Wraps one of the associated constants, which are already normalized.
    pub(crate) fn builtin(raw: &'static str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        &self.0[..self.0.len() - SCHEME_SEPARATOR.len()]
    }
}

impl fmt::Display for ProtocolToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProtocolToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<ProtocolToken> for String {
    fn from(token: ProtocolToken) -> Self {
        token.0
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'))
}

/// The set of protocols the process knows how to route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedProtocols {
    tokens: BTreeSet<ProtocolToken>,
}

impl SupportedProtocols {
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = tokens
            .into_iter()
            .map(|t| ProtocolToken::new(t.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { tokens })
    }

    pub fn contains(&self, token: &ProtocolToken) -> bool {
        self.tokens.contains(token)
    }

    /// Derives the protocol token of `storage_uri` and checks it against the set.
    pub fn extract(&self, storage_uri: &str) -> Result<ProtocolToken> {
        if storage_uri.is_empty() {
            return Err(Error::MissingProtocol(storage_uri.to_string()));
        }

        let scheme = match storage_uri.find(SCHEME_SEPARATOR) {
            Some(end) => &storage_uri[..end],
            None => return Err(Error::MissingProtocol(storage_uri.to_string())),
        };

        let token = ProtocolToken::new(scheme)
            .map_err(|_| Error::MissingProtocol(storage_uri.to_string()))?;

        if self.contains(&token) {
            Ok(token)
        } else {
            Err(Error::UnsupportedProtocol(token.to_string()))
        }
    }
}

impl Default for SupportedProtocols {
    fn default() -> Self {
        let tokens = [
            ProtocolToken::S3,
            ProtocolToken::GCS,
            ProtocolToken::PVC,
            ProtocolToken::FILE,
            ProtocolToken::HDFS,
            ProtocolToken::WEBHDFS,
            ProtocolToken::HTTP,
            ProtocolToken::HTTPS,
        ]
        .into_iter()
        .map(ProtocolToken::builtin)
        .collect();
        Self { tokens }
    }
}
