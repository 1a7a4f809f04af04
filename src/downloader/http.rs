use crate::downloader::{model_dir, Downloader};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const DEFAULT_FILE_NAME: &str = "model";

/// Fetches `http://` and `https://` artifacts as a single file.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// `timeout` bounds the whole transfer, body included; `None` leaves it
    /// unbounded so large artifacts are limited only by `connect_timeout`.
    pub fn new(connect_timeout: Duration, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::download(format!("could not create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Last path segment of `uri`, ignoring query and fragment.
fn file_name(uri: &str) -> &str {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    match path.split_once('/') {
        Some((_, tail)) => tail
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME),
        None => DEFAULT_FILE_NAME,
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, dest_dir: &Path, model_name: &str, storage_uri: &str) -> Result<()> {
        let target_dir = model_dir(dest_dir, model_name);
        let target = target_dir.join(file_name(storage_uri));
        tracing::info!("Downloading {} to {:?}", storage_uri, target);

        let mut response = self
            .client
            .get(storage_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::download(format!("{}: {}", storage_uri, e)))?;

        fs::create_dir_all(&target_dir).await?;
        let mut file = fs::File::create(&target).await?;

        match write_body(&mut response, &mut file, storage_uri).await {
            Ok(written) => {
                tracing::info!("Downloaded {} bytes to {:?}", written, target);
                Ok(())
            }
            Err(err) => {
                drop(file);
                if let Err(e) = fs::remove_file(&target).await {
                    tracing::warn!("Could not remove partial download {:?}: {}", target, e);
                }
                Err(err)
            }
        }
    }
}

async fn write_body(
    response: &mut reqwest::Response,
    file: &mut fs::File,
    storage_uri: &str,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::download(format!("{}: {}", storage_uri, e)))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
