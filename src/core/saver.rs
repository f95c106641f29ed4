use anyhow::Context;
use async_trait::async_trait;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// The environment's "save bytes as a file" capability.
#[async_trait]
pub trait BinarySaver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Persists `data` under (a sanitized form of) `suggested_name` and returns where it landed.
    async fn save_binary_as(&self, data: &[u8], media_type: &str, suggested_name: &str) -> anyhow::Result<PathBuf>;
}

/// Saves artifacts into a fixed output directory, replacing any previous file of the same name.
pub struct DirectorySaver {
    out_dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

/// Staging file for one save. Removed on drop unless committed.
struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn new(path: PathBuf) -> Self {
        Self { path, committed: false }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl BinarySaver for DirectorySaver {
    fn name(&self) -> &'static str { "directory-saver" }

    async fn save_binary_as(&self, data: &[u8], media_type: &str, suggested_name: &str) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.out_dir).await
            .with_context(|| format!("create out_dir {}", self.out_dir.display()))?;

        let file_name = Some(sanitize(suggested_name))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "download.bin".to_string());
        let target = self.out_dir.join(file_name);

        let mut staged = StagedFile::new(target.with_extension("partial"));

        let mut f = File::create(&staged.path)
            .await
            .with_context(|| format!("open {:?}", staged.path))?;
        f.write_all(data).await?;
        f.flush().await?;
        drop(f);

        if tokio::fs::metadata(&target).await.is_ok() {
            let _ = tokio::fs::remove_file(&target).await;
        }
        tokio::fs::rename(&staged.path, &target)
            .await
            .with_context(|| format!("rename {:?} -> {:?}", staged.path, target))?;
        staged.committed = true;

        tracing::debug!(path = %target.display(), media_type, bytes = data.len(), "artifact saved");
        Ok(target)
    }
}
