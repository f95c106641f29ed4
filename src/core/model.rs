use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type RequestId = Uuid;

/// Media type every compressed result is materialized with.
pub const RESULT_MEDIA_TYPE: &str = "image/jpeg";
/// File name offered to the save capability for every result.
pub const RESULT_FILE_NAME: &str = "compressed.jpg";
/// Initial value of the target-size input.
pub const DEFAULT_TARGET_SIZE_KB: &str = "200";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed)
    }
}

/// A file chosen by the user, held in memory until the next selection.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self::new(name, media_type_for(path), data))
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Declared media type derived from the file extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// One submission, built fresh on every `submit` and dropped once it resolves.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub id: RequestId,
    pub source: SourceFile,
    pub target_size_kb: String,
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub data: Bytes,
    pub media_type: &'static str,
}

impl CompressionResult {
    /// The server always answers with JPEG data, whatever was uploaded.
    pub fn from_response(data: Bytes) -> Self {
        Self { data, media_type: RESULT_MEDIA_TYPE }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub request_id: RequestId,
    pub saved_to: PathBuf,
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_follows_extension_case_insensitively() {
        assert_eq!(media_type_for(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("shot.png")), "image/png");
        assert_eq!(media_type_for(Path::new("anim.webp")), "image/webp");
        assert_eq!(media_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn result_is_always_jpeg() {
        let r = CompressionResult::from_response(Bytes::from_static(b"\x89PNG"));
        assert_eq!(r.media_type, "image/jpeg");
        assert_eq!(&r.data[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn from_path_keeps_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.webp");
        tokio::fs::write(&path, b"RIFFxxxxWEBP").await.unwrap();

        let f = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(f.name, "cat.webp");
        assert_eq!(f.media_type, "image/webp");
        assert_eq!(f.len(), 12);
        assert!(!f.is_empty());
    }

    #[tokio::test]
    async fn from_path_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SourceFile::from_path(&dir.path().join("nope.png")).await.is_err());
    }
}
