use crate::error::{Error, Result};
use crate::registry::{ListOptions, ModelArtifact, ModelVersion, RegisteredModel, RegistryClient};

/// Picks the named version of `model`, or its most recent one when no name is given.
pub async fn resolve_version(
    client: &dyn RegistryClient,
    model: &RegisteredModel,
    version_name: Option<&str>,
) -> Result<ModelVersion> {
    if let Some(name) = version_name {
        tracing::debug!("Looking up version '{}' of model {}", name, model.name);
        return client.get_model_version_by_name(name, &model.id).await;
    }

    let page = client
        .list_model_versions(&model.id, &ListOptions::newest_first())
        .await?;

    let mut versions = page.items;
    if !is_newest_first(&versions, |v| v.create_time) {
        tracing::warn!(
            "Registry returned versions of model {} out of order, sorting locally",
            model.name
        );
        versions.sort_by(|a, b| b.create_time.cmp(&a.create_time));
    }

    let latest = versions
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoVersionsFound(model.name.clone()))?;

    tracing::debug!(
        "Latest version of model {} is {} ({:?}, created {:?})",
        model.name,
        latest.id,
        latest.name,
        latest.created_at()
    );
    Ok(latest)
}

/// Picks the most recent model artifact of `version` and checks it has a URI.
///
/// Pages are followed until one of them holds a model artifact, so a first
/// page made only of other artifact types does not hide older models.
pub async fn resolve_artifact(
    client: &dyn RegistryClient,
    version: &ModelVersion,
) -> Result<ModelArtifact> {
    let mut options = ListOptions::newest_first();
    let mut artifacts: Vec<ModelArtifact> = Vec::new();
    loop {
        let page = client.list_model_artifacts(&version.id, &options).await?;
        artifacts.extend(page.items.into_iter().filter(ModelArtifact::is_model_artifact));

        let next = page.next_page_token.filter(|t| !t.is_empty());
        match next {
            Some(token) if artifacts.is_empty() => {
                if options.next_page_token.as_deref() == Some(token.as_str()) {
                    tracing::warn!(
                        "Registry repeated page token '{}' for version {}, stopping",
                        token,
                        version.id
                    );
                    break;
                }
                tracing::debug!(
                    "No model artifact on this page of version {}, fetching next",
                    version.id
                );
                options.next_page_token = Some(token);
            }
            _ => break,
        }
    }

    if !is_newest_first(&artifacts, |a| a.create_time) {
        tracing::warn!(
            "Registry returned artifacts of version {} out of order, sorting locally",
            version.id
        );
        artifacts.sort_by(|a, b| b.create_time.cmp(&a.create_time));
    }

    let artifact = artifacts
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoArtifactsFound(version.id.clone()))?;

    tracing::debug!(
        "Latest artifact of version {} is {} (created {:?})",
        version.id,
        artifact.id,
        artifact.created_at()
    );

    match artifact.uri.as_deref() {
        Some(uri) if !uri.is_empty() => Ok(artifact),
        _ => Err(Error::EmptyArtifactUri {
            artifact_id: artifact.id,
        }),
    }
}

fn is_newest_first<T>(items: &[T], create_time: impl Fn(&T) -> i64) -> bool {
    items
        .windows(2)
        .all(|pair| create_time(&pair[0]) >= create_time(&pair[1]))
}
