use crate::error::{Error, Result};
use crate::registry::{
    ListOptions, ListPage, ModelArtifact, ModelVersion, OrderBy, RegisteredModel, RegistryClient,
    SortOrder,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<CatalogModel>,
}

#[derive(Debug, Deserialize)]
struct CatalogModel {
    id: String,
    name: String,
    #[serde(default)]
    versions: Vec<CatalogVersion>,
}

#[derive(Debug, Deserialize)]
struct CatalogVersion {
    id: String,
    name: Option<String>,
    #[serde(default)]
    create_time: i64,
    #[serde(default)]
    artifacts: Vec<CatalogArtifact>,
}

#[derive(Debug, Deserialize)]
struct CatalogArtifact {
    id: String,
    uri: Option<String>,
    #[serde(default)]
    create_time: i64,
    artifact_type: Option<String>,
}

#[derive(Debug, Clone)]
struct VersionEntry {
    model_id: String,
    version: ModelVersion,
}

#[derive(Debug, Clone)]
struct ArtifactEntry {
    version_id: String,
    artifact: ModelArtifact,
}

/// Registry answered from memory, typically loaded from a TOML catalog.
///
/// ```toml
/// [[models]]
/// id = "1"
/// name = "sklearn-iris"
///
/// [[models.versions]]
/// id = "2"
/// name = "v1"
/// create_time = 10
///
/// [[models.versions.artifacts]]
/// id = "3"
/// uri = "s3://bucket/model.joblib"
/// create_time = 10
/// ```
///
/// Listings are paged like the REST API: the page token is the offset of the
/// next item, and pages are unbounded unless a size is requested or a
/// default is set with [`CatalogRegistry::with_default_page_size`].
#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    models: Vec<RegisteredModel>,
    versions: Vec<VersionEntry>,
    artifacts: Vec<ArtifactEntry>,
    default_page_size: Option<u32>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading model registry catalog from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let mut catalog = Self::new();

        for model in file.models {
            catalog.add_model(&model.id, &model.name);
            for version in model.versions {
                catalog.add_version(
                    &model.id,
                    ModelVersion {
                        id: version.id.clone(),
                        name: version.name,
                        create_time: version.create_time,
                    },
                );
                for artifact in version.artifacts {
                    catalog.add_artifact(
                        &version.id,
                        ModelArtifact {
                            id: artifact.id,
                            uri: artifact.uri,
                            create_time: artifact.create_time,
                            artifact_type: artifact.artifact_type,
                        },
                    );
                }
            }
        }

        Ok(catalog)
    }

    pub fn with_default_page_size(&mut self, page_size: u32) -> &mut Self {
        self.default_page_size = Some(page_size);
        self
    }

    fn page<T>(
        &self,
        mut items: Vec<T>,
        options: &ListOptions,
        key: impl Fn(&T) -> (i64, &str),
    ) -> Result<ListPage<T>> {
        items.sort_by(|a, b| {
            let ord = compare(options.order_by, key(a), key(b));
            match options.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let offset = match options.next_page_token.as_deref() {
            None | Some("") => 0,
            Some(token) => token.parse::<usize>().map_err(|_| Error::Registry {
                status: 400,
                message: format!("invalid page token '{}'", token),
            })?,
        };
        let total = items.len();
        let mut items: Vec<T> = items.into_iter().skip(offset).collect();

        let page_size = options.page_size.or(self.default_page_size);
        let mut next_page_token = None;
        if let Some(size) = page_size {
            let size = size as usize;
            if offset + size < total {
                next_page_token = Some((offset + size).to_string());
            }
            items.truncate(size);
        }

        let mut page = ListPage::new(items);
        if let Some(size) = page_size {
            page.page_size = size;
        }
        page.next_page_token = next_page_token;
        Ok(page)
    }

    pub fn add_model(&mut self, id: &str, name: &str) -> &mut Self {
        self.models.push(RegisteredModel {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn add_version(&mut self, model_id: &str, version: ModelVersion) -> &mut Self {
        self.versions.push(VersionEntry {
            model_id: model_id.to_string(),
            version,
        });
        self
    }

    pub fn add_artifact(&mut self, version_id: &str, artifact: ModelArtifact) -> &mut Self {
        self.artifacts.push(ArtifactEntry {
            version_id: version_id.to_string(),
            artifact,
        });
        self
    }
}

fn compare(order_by: OrderBy, a: (i64, &str), b: (i64, &str)) -> Ordering {
    match order_by {
        OrderBy::CreateTime | OrderBy::LastUpdateTime => a.0.cmp(&b.0),
        OrderBy::Id => a.1.cmp(b.1),
    }
}

#[async_trait]
impl RegistryClient for CatalogRegistry {
    async fn get_registered_model_by_name(&self, name: &str) -> Result<RegisteredModel> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| Error::ModelNotFound(name.to_string()))
    }

    async fn get_model_version_by_name(
        &self,
        version_name: &str,
        registered_model_id: &str,
    ) -> Result<ModelVersion> {
        self.versions
            .iter()
            .find(|e| {
                e.model_id == registered_model_id && e.version.name.as_deref() == Some(version_name)
            })
            .map(|e| e.version.clone())
            .ok_or_else(|| Error::VersionNotFound {
                version: version_name.to_string(),
                model_id: registered_model_id.to_string(),
            })
    }

    async fn list_model_versions(
        &self,
        registered_model_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelVersion>> {
        let versions = self
            .versions
            .iter()
            .filter(|e| e.model_id == registered_model_id)
            .map(|e| e.version.clone())
            .collect();
        self.page(versions, options, |v| (v.create_time, v.id.as_str()))
    }

    async fn list_model_artifacts(
        &self,
        model_version_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelArtifact>> {
        let artifacts = self
            .artifacts
            .iter()
            .filter(|e| e.version_id == model_version_id)
            .map(|e| e.artifact.clone())
            .collect();
        self.page(artifacts, options, |a| (a.create_time, a.id.as_str()))
    }
}
