use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::registry::{
    ListOptions, ListPage, ModelArtifact, ModelVersion, RegisteredModel, RegistryClient,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    message: String,
}

/// Client for the model registry REST API.
#[derive(Debug, Clone)]
pub struct RestRegistryClient {
    http: Client,
    api_base: String,
}

impl RestRegistryClient {
    /// Builds the client without touching the network.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base(),
        })
    }

    /// Builds the client and checks the registry answers within the connect window.
    pub async fn connect(config: &RegistryConfig) -> Result<Self> {
        let client = Self::new(config)?;
        tracing::info!("Connecting to model registry at {}", client.api_base);

        let probe = client
            .http
            .get(client.url("registered_models"))
            .query(&[("pageSize", "1")])
            .timeout(config.connect_timeout);
        client
            .send::<ListPage<RegisteredModel>>(probe, |_| None)
            .await?;

        tracing::debug!("Model registry at {} is reachable", client.api_base);
        Ok(client)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    /// Sends `request`, decoding a 2xx body as `T`. `not_found` turns a 404
    /// message into the caller's typed error; otherwise non-2xx replies are
    /// reported as [`Error::Registry`].
    async fn send<T>(
        &self,
        request: RequestBuilder,
        not_found: impl FnOnce(String) -> Option<Error>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorReply>(&body)
            .map(|reply| reply.message)
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            if let Some(err) = not_found(message.clone()) {
                return Err(err);
            }
        }

        Err(Error::Registry {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RegistryClient for RestRegistryClient {
    async fn get_registered_model_by_name(&self, name: &str) -> Result<RegisteredModel> {
        tracing::debug!("GET registered_model name={}", name);
        let request = self
            .http
            .get(self.url("registered_model"))
            .query(&[("name", name)]);
        self.send(request, |_| Some(Error::ModelNotFound(name.to_string())))
            .await
    }

    async fn get_model_version_by_name(
        &self,
        version_name: &str,
        registered_model_id: &str,
    ) -> Result<ModelVersion> {
        tracing::debug!(
            "GET model_version name={} parentResourceId={}",
            version_name,
            registered_model_id
        );
        let request = self.http.get(self.url("model_version")).query(&[
            ("name", version_name),
            ("parentResourceId", registered_model_id),
        ]);
        self.send(request, |_| {
            Some(Error::VersionNotFound {
                version: version_name.to_string(),
                model_id: registered_model_id.to_string(),
            })
        })
        .await
    }

    async fn list_model_versions(
        &self,
        registered_model_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelVersion>> {
        let path = format!("registered_models/{}/versions", registered_model_id);
        tracing::debug!("GET {} {:?}", path, options);
        let request = self.http.get(self.url(&path)).query(&options.query());
        self.send(request, |_| {
            Some(Error::ModelNotFound(registered_model_id.to_string()))
        })
        .await
    }

    async fn list_model_artifacts(
        &self,
        model_version_id: &str,
        options: &ListOptions,
    ) -> Result<ListPage<ModelArtifact>> {
        let path = format!("model_versions/{}/artifacts", model_version_id);
        tracing::debug!("GET {} {:?}", path, options);
        let request = self.http.get(self.url(&path)).query(&options.query());
        self.send(request, |_| None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_hang_off_the_api_base() {
        let config = RegistryConfig {
            base_url: "registry.local:8080".to_string(),
            ..RegistryConfig::default()
        };
        let client = RestRegistryClient::new(&config).unwrap();
        assert_eq!(
            client.url("registered_model"),
            "http://registry.local:8080/api/model_registry/v1alpha3/registered_model"
        );
    }
}
