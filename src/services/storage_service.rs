use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::error::{Error, Result};

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

pub const ALLOWED_EXTENSIONS: [&str; 9] = ["pdf", "doc", "docx", "txt", "rtf", "jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
}

/// A stored file ready to be streamed back to the client.
pub struct FileDownload {
    pub stream: ByteStream,
    pub content_type: &'static str,
    pub filename: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, data: Bytes, content_type: &str, content_length: usize, path: &str) -> Result<StoredObject>;

    async fn get_file_stream(&self, path: &str) -> Result<ByteStream>;

    /// Removing a path that does not exist is not an error.
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Lower-cased extension of an uploaded file name, checked against the default
/// allow-list and the leading bytes of the content.
pub fn checked_extension(filename: &str, data: &[u8]) -> Result<String> {
    checked_extension_in(filename, data, &ALLOWED_EXTENSIONS)
}

pub fn checked_extension_in(filename: &str, data: &[u8], allowed: &[&str]) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    if !allowed.contains(&ext.as_str()) {
        return Err(Error::BadRequest(format!("File type .{} is not allowed", ext)));
    }

    if ext == "pdf" && !data.starts_with(b"%PDF") {
        return Err(Error::BadRequest("Invalid PDF file content".into()));
    }
    if (ext == "jpg" || ext == "jpeg") && !data.starts_with(&[0xFF, 0xD8]) {
        return Err(Error::BadRequest("Invalid JPEG file content".into()));
    }
    if ext == "png" && !data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Err(Error::BadRequest("Invalid PNG file content".into()));
    }
    if ext == "gif" && !data.starts_with(b"GIF8") {
        return Err(Error::BadRequest("Invalid GIF file content".into()));
    }

    Ok(ext)
}

pub fn content_type_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Stores objects as files below a root directory.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::BadRequest("Invalid file path".to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, data: Bytes, content_type: &str, content_length: usize, path: &str) -> Result<StoredObject> {
        if data.len() != content_length {
            return Err(Error::BadRequest("Upload length mismatch".to_string()));
        }
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &data).await.map_err(|e| {
            tracing::error!(path = %target.display(), error = %e, "failed to write upload");
            Error::Io(e)
        })?;
        tracing::debug!(path, content_type, bytes = content_length, "stored upload");
        Ok(StoredObject { url: path.to_string() })
    }

    async fn get_file_stream(&self, path: &str) -> Result<ByteStream> {
        let target = self.resolve(path)?;
        let file = match fs::File::open(&target).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound("File not found".to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn rejects_disallowed_extension_and_bad_signature() {
        assert!(matches!(checked_extension("cv.exe", b"MZ"), Err(Error::BadRequest(_))));
        assert!(matches!(checked_extension("cv.pdf", b"hello"), Err(Error::BadRequest(_))));
        assert_eq!(checked_extension("CV.PDF", b"%PDF-1.7").unwrap(), "pdf");
        assert!(matches!(checked_extension("cat.gif", b"GIF89a"), Err(Error::BadRequest(_))));
        assert_eq!(checked_extension_in("cat.gif", b"GIF89a", &["gif"]).unwrap(), "gif");
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("cv/abc.pdf"), "application/pdf");
        assert_eq!(content_type_for("cv/abc"), "application/octet-stream");
    }

    #[tokio::test]
    async fn upload_then_stream_back() {
        let root = std::env::temp_dir().join(format!("ats-storage-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(&root);
        let data = Bytes::from_static(b"%PDF-1.7 body");

        let stored = storage
            .upload(data.clone(), "application/pdf", data.len(), "t/cv/one.pdf")
            .await
            .unwrap();
        assert_eq!(stored.url, "t/cv/one.pdf");

        let mut stream = storage.get_file_stream("t/cv/one.pdf").await.unwrap();
        let mut read = Vec::new();
        while let Some(chunk) = stream.next().await {
            read.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(read, data.to_vec());

        storage.delete("t/cv/one.pdf").await.unwrap();
        assert!(matches!(
            storage.get_file_stream("t/cv/one.pdf").await,
            Err(Error::NotFound(_))
        ));
        storage.delete("t/cv/one.pdf").await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn parent_traversal_is_refused() {
        let storage = LocalStorage::new("/tmp/ats-unused");
        assert!(matches!(
            storage.get_file_stream("../etc/passwd").await,
            Err(Error::BadRequest(_))
        ));
    }
}
