use indexmap::IndexMap;

use crate::briefs::{AdFormat, CampaignBrief, ToneOfVoice};
use crate::runs::manifest::CREATIVE_BATCH_SIZE;

/// Used when a tone somehow misses the table. Unreachable with the enum
/// input, kept so lookups can never fail.
pub const FALLBACK_EMOTION: &str = "genuine enthusiasm";

fn emotion_table() -> IndexMap<ToneOfVoice, &'static str> {
    IndexMap::from([
        (ToneOfVoice::Professional, "trust and quiet confidence"),
        (ToneOfVoice::Friendly, "warmth and belonging"),
        (ToneOfVoice::Playful, "joy and lighthearted surprise"),
        (ToneOfVoice::Bold, "excitement and urgency"),
        (ToneOfVoice::Luxury, "desire and exclusivity"),
    ])
}

fn aspect_table() -> IndexMap<AdFormat, &'static str> {
    IndexMap::from([
        (
            AdFormat::Square,
            "square composition suited to feed placements",
        ),
        (
            AdFormat::Vertical,
            "tall vertical composition suited to stories and reels",
        ),
        (
            AdFormat::Landscape,
            "wide landscape composition suited to link and banner placements",
        ),
    ])
}

pub fn emotion_for_tone(tone: ToneOfVoice) -> &'static str {
    emotion_table().get(&tone).copied().unwrap_or(FALLBACK_EMOTION)
}

pub fn aspect_description(format: AdFormat) -> &'static str {
    aspect_table()
        .get(&format)
        .copied()
        .unwrap_or_else(|| aspect_table()[&AdFormat::Square])
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptPair {
    pub copy_prompt: String,
    pub image_prompt: String,
}

/// Pure function of the brief. One copy prompt covering all six variations,
/// one image prompt sampled six times.
pub fn build_prompts(brief: &CampaignBrief) -> PromptPair {
    let emotion = emotion_for_tone(brief.tone);
    let offer_line = if brief.offer.trim().is_empty() {
        String::new()
    } else {
        format!("Current offer: {}. ", brief.offer.trim())
    };

    let copy_prompt = format!(
        "You are a senior advertising copywriter. Write {count} distinct ad copy \
         variations for the campaign below.\n\
         Product: {product}\n\
         Target audience: {audience}\n\
         {offer_line}Tone of voice: {tone}.\n\
         Each variation needs a punchy title of at most eight words and body text of \
         at most forty words. Every variation should evoke {emotion} and end with a \
         clear call to action.",
        count = CREATIVE_BATCH_SIZE,
        product = brief.product.trim(),
        audience = brief.audience.trim(),
        offer_line = offer_line,
        tone = brief.tone.as_str(),
        emotion = emotion,
    );

    let image_prompt = format!(
        "Create a polished advertising photograph of {product}, aimed at {audience}. \
         {offer_line}The scene should evoke {emotion} and read clearly as a {aspect}. \
         Match the product's appearance, styling, and branding to the attached \
         reference images. No text overlays.",
        product = brief.product.trim(),
        audience = brief.audience.trim(),
        offer_line = offer_line,
        emotion = emotion,
        aspect = aspect_description(brief.ad_format),
    );

    PromptPair {
        copy_prompt,
        image_prompt,
    }
}
