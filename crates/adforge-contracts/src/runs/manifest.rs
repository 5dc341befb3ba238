use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::briefs::CampaignBrief;

/// One generation batch is always six variations. Product decision, not a
/// knob.
pub const CREATIVE_BATCH_SIZE: usize = 6;

pub const MANIFEST_FILE_NAME: &str = "creatives.json";

/// One element of the structured copy response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyEntry {
    pub title: String,
    pub text: String,
}

impl CopyEntry {
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() || self.text.trim().is_empty()
    }
}

/// One finished ad variant: an image on disk zipped with its copy entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creative {
    pub id: usize,
    pub image_path: String,
    pub mime_type: String,
    pub title: String,
    pub text: String,
    pub aspect_ratio: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// `creatives.json`: the whole batch, replaced wholesale on every run. The
/// file either does not exist or holds exactly [`CREATIVE_BATCH_SIZE`]
/// creatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_id: String,
    pub created_at: String,
    pub brief: CampaignBrief,
    pub text_model: String,
    pub image_model: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub creatives: Vec<Creative>,
}

impl BatchManifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("manifest {} is not valid JSON", path.display()))
    }
}
