use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::StorageConfig;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Image,
    Video,
    Document,
    Pdf,
    Archive,
}

/// Per-category ceiling and accepted MIME types
#[derive(Debug)]
pub struct UploadLimit {
    pub category: FileCategory,
    pub max_bytes: u64,
    pub mime_types: &'static [&'static str],
}

pub static UPLOAD_LIMITS: [UploadLimit; 5] = [
    UploadLimit {
        category: FileCategory::Image,
        max_bytes: 2 * MB,
        mime_types: &["image/jpeg", "image/png", "image/gif", "image/webp", "image/svg+xml"],
    },
    UploadLimit {
        category: FileCategory::Video,
        max_bytes: 100 * MB,
        mime_types: &["video/mp4", "video/webm", "video/quicktime", "video/x-msvideo"],
    },
    UploadLimit {
        category: FileCategory::Document,
        max_bytes: 10 * MB,
        mime_types: &[
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "application/vnd.ms-powerpoint",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "application/vnd.ms-excel",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "text/plain",
            "text/csv",
        ],
    },
    UploadLimit {
        category: FileCategory::Pdf,
        max_bytes: 10 * MB,
        mime_types: &["application/pdf"],
    },
    UploadLimit {
        category: FileCategory::Archive,
        max_bytes: 10 * MB,
        mime_types: &["application/zip", "application/x-zip-compressed", "application/gzip", "application/x-tar"],
    },
];

impl FileCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Image => "image",
            FileCategory::Video => "video",
            FileCategory::Document => "document",
            FileCategory::Pdf => "pdf",
            FileCategory::Archive => "archive",
        }
    }

    pub fn limit(self) -> &'static UploadLimit {
        UPLOAD_LIMITS
            .iter()
            .find(|limit| limit.category == self)
            .unwrap_or(&UPLOAD_LIMITS[2])
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileCategory {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UPLOAD_LIMITS
            .iter()
            .map(|limit| limit.category)
            .find(|category| category.as_str() == s)
            .ok_or_else(|| StorageError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unknown file category '{0}'")]
    UnknownCategory(String),

    #[error("File exceeds the {max_bytes} byte limit for {category} uploads")]
    TooLarge { category: FileCategory, max_bytes: u64 },

    #[error("File type '{mime_type}' is not accepted for {category} uploads")]
    UnsupportedType { category: FileCategory, mime_type: String },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Multipart framing added on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Body ceiling for the upload route: the largest category plus multipart framing
pub fn max_upload_body_bytes() -> usize {
    let largest = UPLOAD_LIMITS.iter().map(|limit| limit.max_bytes).max().unwrap_or(0);
    (largest + MULTIPART_OVERHEAD) as usize
}

/// Reject a request whose declared length already exceeds the category ceiling
pub fn check_declared_length(category: FileCategory, content_length: Option<u64>) -> Result<(), StorageError> {
    let limit = category.limit();
    match content_length {
        Some(length) if length > limit.max_bytes + MULTIPART_OVERHEAD => Err(StorageError::TooLarge {
            category,
            max_bytes: limit.max_bytes,
        }),
        _ => Ok(()),
    }
}

pub fn check_mime_type(category: FileCategory, mime_type: &str) -> Result<(), StorageError> {
    let essence = mime_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if category.limit().mime_types.contains(&essence.as_str()) {
        Ok(())
    } else {
        Err(StorageError::UnsupportedType { category, mime_type: essence })
    }
}

/// Running byte count for a streamed upload
#[derive(Debug)]
pub struct SizeGuard {
    category: FileCategory,
    received: u64,
}

impl SizeGuard {
    pub fn new(category: FileCategory) -> Self {
        Self { category, received: 0 }
    }

    pub fn accept(&mut self, chunk_len: usize) -> Result<(), StorageError> {
        self.received += chunk_len as u64;
        let max_bytes = self.category.limit().max_bytes;
        if self.received > max_bytes {
            return Err(StorageError::TooLarge { category: self.category, max_bytes });
        }
        Ok(())
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub url: String,
    pub size: i64,
    pub name: String,
    pub mime_type: String,
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, category: FileCategory, upload: Upload) -> Result<StoredFile, StorageError>;

    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Relative object key: `<category>/<digest>[.ext]`
pub fn object_key(category: FileCategory, upload: &Upload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(&upload.data);
    let digest = format!("{:x}", hasher.finalize());

    let extension = Path::new(&upload.original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{}/{}{}", category, &digest[..32], extension)
}

/// Files under a local directory, served from `public_base_url`
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    public_base_url: Url,
}

impl LocalFileStorage {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let mut base = config.public_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            root: PathBuf::from(&config.root),
            public_base_url: Url::parse(&base)?,
        })
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, category: FileCategory, upload: Upload) -> Result<StoredFile, StorageError> {
        if upload.data.is_empty() {
            return Err(StorageError::Empty);
        }
        let key = object_key(category, &upload);
        let target = self.root.join(&key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &upload.data).await?;
        tracing::debug!("Stored {} bytes at {}", upload.data.len(), target.display());

        Ok(StoredFile {
            url: self.public_base_url.join(&key)?.to_string(),
            path: key,
            size: upload.data.len() as i64,
            name: upload.original_name,
            mime_type: upload.mime_type,
        })
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Stored file {} was already gone", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_limit_per_category() {
        for category in [
            FileCategory::Image,
            FileCategory::Video,
            FileCategory::Document,
            FileCategory::Pdf,
            FileCategory::Archive,
        ] {
            assert_eq!(category.limit().category, category);
            assert_eq!(category.as_str().parse::<FileCategory>().unwrap(), category);
        }
        assert_eq!(FileCategory::Image.limit().max_bytes, 2 * MB);
        assert_eq!(FileCategory::Video.limit().max_bytes, 100 * MB);
        assert_eq!(FileCategory::Pdf.limit().max_bytes, 10 * MB);
        assert_eq!(max_upload_body_bytes() as u64, 100 * MB + MULTIPART_OVERHEAD);
        assert!("spreadsheet".parse::<FileCategory>().is_err());
    }

    #[test]
    fn declared_length_is_checked_before_transfer() {
        assert!(check_declared_length(FileCategory::Image, Some(MB)).is_ok());
        assert!(check_declared_length(FileCategory::Image, None).is_ok());
        assert!(matches!(
            check_declared_length(FileCategory::Image, Some(3 * MB)),
            Err(StorageError::TooLarge { max_bytes, .. }) if max_bytes == 2 * MB
        ));
    }

    #[test]
    fn size_guard_trips_mid_stream() {
        let mut guard = SizeGuard::new(FileCategory::Image);
        assert!(guard.accept(MB as usize).is_ok());
        assert!(guard.accept(MB as usize).is_ok());
        assert!(guard.accept(1).is_err());
        assert_eq!(guard.received(), 2 * MB + 1);
    }

    #[test]
    fn mime_types_are_matched_per_category() {
        assert!(check_mime_type(FileCategory::Pdf, "application/pdf").is_ok());
        assert!(check_mime_type(FileCategory::Document, "text/plain; charset=utf-8").is_ok());
        assert!(check_mime_type(FileCategory::Image, "application/pdf").is_err());
    }

    #[test]
    fn object_keys_keep_safe_extensions() {
        let upload = Upload {
            original_name: "Report.PDF".into(),
            mime_type: "application/pdf".into(),
            data: b"%PDF".to_vec(),
        };
        let key = object_key(FileCategory::Pdf, &upload);
        assert!(key.starts_with("pdf/"));
        assert!(key.ends_with(".pdf"));
        assert_ne!(key, object_key(FileCategory::Pdf, &upload));

        let odd = Upload { original_name: "x.p$f".into(), ..upload };
        assert!(!object_key(FileCategory::Pdf, &odd).contains('.'));
    }

    #[tokio::test]
    async fn local_storage_writes_and_removes() {
        let root = std::env::temp_dir().join(format!("lms-api-storage-{}", Uuid::new_v4()));
        let storage = LocalFileStorage::new(&StorageConfig {
            root: root.to_string_lossy().into_owned(),
            public_base_url: "http://files.test/media".into(),
        })
        .unwrap();

        let stored = storage
            .store(
                FileCategory::Document,
                Upload { original_name: "notes.txt".into(), mime_type: "text/plain".into(), data: b"hello".to_vec() },
            )
            .await
            .unwrap();
        assert_eq!(stored.size, 5);
        assert!(stored.url.starts_with("http://files.test/media/document/"));
        assert!(root.join(&stored.path).exists());

        storage.remove(&stored.path).await.unwrap();
        assert!(!root.join(&stored.path).exists());
        storage.remove(&stored.path).await.unwrap();
        let _ = std::fs::remove_dir_all(root);
    }
}
