use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Placement format of a creative batch. Serialized with the wire spellings
/// the ad platforms use (`1:1`, `9:16`, `1.91:1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdFormat {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "1.91:1")]
    Landscape,
}

impl AdFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdFormat::Square => "1:1",
            AdFormat::Vertical => "9:16",
            AdFormat::Landscape => "1.91:1",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1:1" | "square" => Some(AdFormat::Square),
            "9:16" | "vertical" | "story" => Some(AdFormat::Vertical),
            "1.91:1" | "landscape" | "link" => Some(AdFormat::Landscape),
            _ => None,
        }
    }

    pub fn all() -> [AdFormat; 3] {
        [AdFormat::Square, AdFormat::Vertical, AdFormat::Landscape]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneOfVoice {
    Professional,
    Friendly,
    Playful,
    Bold,
    Luxury,
}

impl ToneOfVoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneOfVoice::Professional => "professional",
            ToneOfVoice::Friendly => "friendly",
            ToneOfVoice::Playful => "playful",
            ToneOfVoice::Bold => "bold",
            ToneOfVoice::Luxury => "luxury",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "professional" => Some(ToneOfVoice::Professional),
            "friendly" => Some(ToneOfVoice::Friendly),
            "playful" => Some(ToneOfVoice::Playful),
            "bold" => Some(ToneOfVoice::Bold),
            "luxury" | "luxurious" => Some(ToneOfVoice::Luxury),
            _ => None,
        }
    }

    pub fn all() -> [ToneOfVoice; 5] {
        [
            ToneOfVoice::Professional,
            ToneOfVoice::Friendly,
            ToneOfVoice::Playful,
            ToneOfVoice::Bold,
            ToneOfVoice::Luxury,
        ]
    }
}

/// One submission's worth of campaign parameters. Echoed verbatim into the
/// batch manifest and receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub product: String,
    pub audience: String,
    #[serde(default)]
    pub offer: String,
    pub ad_format: AdFormat,
    pub tone: ToneOfVoice,
}

impl CampaignBrief {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading brief {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("brief {} is not valid JSON", path.display()))
    }

    /// Every problem that would make a submission a no-op, collected so the
    /// caller can report them all at once.
    pub fn validation_errors(&self, reference_count: usize) -> Vec<String> {
        let mut problems = Vec::new();
        if self.product.trim().is_empty() {
            problems.push("product is required".to_string());
        }
        if self.audience.trim().is_empty() {
            problems.push("audience is required".to_string());
        }
        if reference_count == 0 {
            problems.push("at least one reference image is required".to_string());
        }
        problems
    }

    pub fn validate(&self, reference_count: usize) -> Result<(), String> {
        let problems = self.validation_errors(reference_count);
        if problems.is_empty() {
            return Ok(());
        }
        Err(problems.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::{AdFormat, CampaignBrief, ToneOfVoice};

    fn brief() -> CampaignBrief {
        CampaignBrief {
            product: "Trailhead insulated bottle".to_string(),
            audience: "weekend hikers".to_string(),
            offer: "20% off this month".to_string(),
            ad_format: AdFormat::Vertical,
            tone: ToneOfVoice::Playful,
        }
    }

    #[test]
    fn formats_serialize_with_wire_spellings() -> anyhow::Result<()> {
        let raw = serde_json::to_string(&brief())?;
        assert!(raw.contains("\"9:16\""));
        assert!(raw.contains("\"playful\""));
        let parsed: CampaignBrief = serde_json::from_str(&raw)?;
        assert_eq!(parsed, brief());
        Ok(())
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(AdFormat::parse("Square"), Some(AdFormat::Square));
        assert_eq!(AdFormat::parse("1.91:1"), Some(AdFormat::Landscape));
        assert_eq!(AdFormat::parse("4:5"), None);
        assert_eq!(ToneOfVoice::parse("Luxurious"), Some(ToneOfVoice::Luxury));
        assert_eq!(ToneOfVoice::parse("sarcastic"), None);
    }

    #[test]
    fn validate_passes_with_required_fields_and_one_reference() {
        assert_eq!(brief().validate(1), Ok(()));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut incomplete = brief();
        incomplete.product = "  ".to_string();
        incomplete.audience = String::new();
        let message = incomplete.validate(0).unwrap_err();
        assert!(message.contains("product is required"));
        assert!(message.contains("audience is required"));
        assert!(message.contains("reference image"));
    }

    #[test]
    fn offer_is_optional_on_the_wire() -> anyhow::Result<()> {
        let parsed: CampaignBrief = serde_json::from_str(
            r#"{"product":"p","audience":"a","ad_format":"1:1","tone":"bold"}"#,
        )?;
        assert_eq!(parsed.offer, "");
        assert_eq!(parsed.ad_format, AdFormat::Square);
        Ok(())
    }
}
