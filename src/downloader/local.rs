use crate::downloader::{model_dir, Downloader};
use crate::error::{Error, Result};
use crate::protocol::ProtocolToken;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Copies `file://` paths and `pvc://<claim>/<path>` volumes mounted under `pvc_root`.
#[derive(Debug, Clone)]
pub struct LocalDownloader {
    pvc_root: PathBuf,
}

impl LocalDownloader {
    pub fn new(pvc_root: PathBuf) -> Self {
        Self { pvc_root }
    }

    fn source_path(&self, storage_uri: &str) -> Result<PathBuf> {
        let not_local = || Error::download(format!("{} is not a local storage URI", storage_uri));
        let (scheme, rest) = storage_uri.split_once("://").ok_or_else(not_local)?;
        let token = ProtocolToken::new(scheme).map_err(|_| not_local())?;

        match token.as_str() {
            ProtocolToken::FILE => {
                if rest.is_empty() {
                    return Err(Error::download(format!("{} has no path", storage_uri)));
                }
                Ok(PathBuf::from(rest))
            }
            ProtocolToken::PVC => {
                let (claim, path) = rest.split_once('/').unwrap_or((rest, ""));
                if claim.is_empty() {
                    return Err(Error::download(format!("{} has no volume claim", storage_uri)));
                }
                Ok(self.pvc_root.join(claim).join(path.trim_start_matches('/')))
            }
            _ => Err(not_local()),
        }
    }
}

async fn copy_tree(source: &Path, target: &Path) -> Result<u64> {
    let mut copied = 0u64;
    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let dest = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), dest));
            } else {
                copied += fs::copy(entry.path(), &dest).await?;
            }
        }
    }

    Ok(copied)
}

#[async_trait]
impl Downloader for LocalDownloader {
    async fn download(&self, dest_dir: &Path, model_name: &str, storage_uri: &str) -> Result<()> {
        let source = self.source_path(storage_uri)?;
        let target_dir = model_dir(dest_dir, model_name);

        let metadata = fs::metadata(&source)
            .await
            .map_err(|e| Error::download(format!("{:?}: {}", source, e)))?;

        let copied = if metadata.is_dir() {
            tracing::info!("Copying directory {:?} to {:?}", source, target_dir);
            copy_tree(&source, &target_dir).await?
        } else {
            let name = source
                .file_name()
                .ok_or_else(|| Error::download(format!("{:?} has no file name", source)))?;
            tracing::info!("Copying {:?} to {:?}", source, target_dir);
            fs::create_dir_all(&target_dir).await?;
            fs::copy(&source, target_dir.join(name)).await?
        };

        tracing::info!("Copied {} bytes from {}", copied, storage_uri);
        Ok(())
    }
}
