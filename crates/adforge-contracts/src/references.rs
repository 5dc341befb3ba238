use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One uploaded reference file. The id mirrors the original upload handle:
/// filename stem plus the millisecond timestamp of the add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub id: String,
    pub path: PathBuf,
}

impl ReferenceImage {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("reference");
        let id = format!("{stem}-{}", chrono::Utc::now().timestamp_millis());
        Self { id, path }
    }
}

/// The current set of references for a submission. Whatever is in the set at
/// orchestration time is exactly what gets encoded; a removed image never
/// reaches the payload set.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    images: Vec<ReferenceImage>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            images: paths.into_iter().map(ReferenceImage::from_path).collect(),
        }
    }

    pub fn add(&mut self, path: impl Into<PathBuf>) -> &ReferenceImage {
        self.images.push(ReferenceImage::from_path(path));
        self.images.last().expect("reference just pushed")
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.images.len();
        self.images.retain(|image| image.id != id);
        self.images.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.images.iter().map(|image| image.path.as_path()).collect()
    }
}

/// A reference encoded for transmission: base64 bytes plus MIME type,
/// ephemeral to one orchestration call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImagePayload {
    pub data: String,
    pub mime_type: String,
}
