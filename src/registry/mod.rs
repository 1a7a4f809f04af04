//! Model registry query facade.
//!
//! The resolvers only need four lookups from the registry. [`RegistryClient`]
//! names them; [`RestRegistryClient`] talks to a live registry and
//! [`CatalogRegistry`] answers from a TOML catalog held in memory.

pub mod catalog;
pub mod rest;

pub use catalog::CatalogRegistry;
pub use rest::RestRegistryClient;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredModel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        rename = "createTimeSinceEpoch",
        default,
        deserialize_with = "epoch_millis"
    )]
    pub create_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub id: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(
        rename = "createTimeSinceEpoch",
        default,
        deserialize_with = "epoch_millis"
    )]
    pub create_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl ModelVersion {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.create_time)
    }
}

impl ModelArtifact {
    pub const MODEL_ARTIFACT_TYPE: &'static str = "model-artifact";

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.create_time)
    }

    /// Listings may mix document artifacts in with model artifacts.
    pub fn is_model_artifact(&self) -> bool {
        self.artifact_type
            .as_deref()
            .map_or(true, |t| t == Self::MODEL_ARTIFACT_TYPE)
    }
}

/// The registry serializes epoch millis as decimal strings; catalogs use integers.
fn epoch_millis<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Int(i64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Int(v) => Ok(v),
        Millis::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    CreateTime,
    LastUpdateTime,
    Id,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::CreateTime => "CREATE_TIME",
            OrderBy::LastUpdateTime => "LAST_UPDATE_TIME",
            OrderBy::Id => "ID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub page_size: Option<u32>,
    pub order_by: OrderBy,
    pub sort_order: SortOrder,
    pub next_page_token: Option<String>,
}

impl ListOptions {
    /// Newest first, which is what both resolvers ask for.
    pub fn newest_first() -> Self {
        Self {
            order_by: OrderBy::CreateTime,
            sort_order: SortOrder::Desc,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("orderBy", self.order_by.as_str().to_string()),
            ("sortOrder", self.sort_order.as_str().to_string()),
        ];
        if let Some(size) = self.page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = &self.next_page_token {
            query.push(("nextPageToken", token.clone()));
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl<T> ListPage<T> {
    pub fn new(items: Vec<T>) -> Self {
        let size = items.len() as u32;
        Self {
            items,
            size,
            page_size: size,
            next_page_token: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lookups the download pipeline issues against the model registry.
///
/// Implementations map "no such entity" replies to the matching typed
/// error (`ModelNotFound`, `VersionNotFound`) and pass transport failures
/// through unchanged.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn get_registered_model_by_name(&self, name: &str) -> Result<RegisteredModel>;

    async fn get_model_version_by_name(
        &self,
        version_name: &str,
        registered_model_id: &str,
    ) -> Result<ModelVersion>;

    async fn list_model_versions(
        &self,
        registered_model_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelVersion>>;

    async fn list_model_artifacts(
        &self,
        model_version_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelArtifact>>;
}
