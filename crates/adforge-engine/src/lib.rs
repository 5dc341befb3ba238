use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use adforge_contracts::briefs::{AdFormat, CampaignBrief};
use adforge_contracts::events::EventWriter;
use adforge_contracts::models::ModelRegistry;
use adforge_contracts::prompts::build_prompts;
use adforge_contracts::providers::{NamedProvider, ProviderRegistry};
use adforge_contracts::references::{InlineImagePayload, ReferenceImage, ReferenceSet};
use adforge_contracts::runs::manifest::{
    BatchManifest, CopyEntry, Creative, CREATIVE_BATCH_SIZE, MANIFEST_FILE_NAME,
};
use adforge_contracts::runs::receipts::{build_receipt, write_receipt, SlotRecord};
use adforge_contracts::runs::summary::{write_summary, RunSummary};
use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, Rgb, RgbImage};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

const GEMINI_DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A reference image encoded for transmission, plus a digest for receipts.
#[derive(Debug, Clone)]
pub struct EncodedReference {
    pub id: String,
    pub payload: InlineImagePayload,
    pub digest: String,
}

pub fn encode_reference(reference: &ReferenceImage) -> Result<EncodedReference> {
    let bytes = fs::read(&reference.path)
        .with_context(|| format!("failed reading {}", reference.path.display()))?;
    let mime = mime_for_path(&reference.path).unwrap_or("image/png");
    let digest = hex::encode(Sha256::digest(&bytes));
    Ok(EncodedReference {
        id: reference.id.clone(),
        payload: InlineImagePayload {
            data: BASE64.encode(&bytes),
            mime_type: mime.to_string(),
        },
        digest,
    })
}

/// Encodes whatever is currently in the set; a reference removed before the
/// submission never appears in the result.
pub fn encode_reference_set(references: &ReferenceSet) -> Result<Vec<EncodedReference>> {
    references.iter().map(encode_reference).collect()
}

#[derive(Debug, Clone)]
pub struct CopyRequest {
    pub prompt: String,
    pub variations: usize,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct CopyDeck {
    pub entries: Vec<CopyEntry>,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
}

/// One of the six image samples. Every slot carries the same prompt and the
/// same full reference set; only the slot index differs.
#[derive(Debug, Clone, Copy)]
pub struct ImageSlotRequest<'a> {
    pub prompt: &'a str,
    pub slot: usize,
    pub model: &'a str,
    pub aspect_ratio: AdFormat,
    pub references: &'a [EncodedReference],
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
}

pub trait CopyProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &CopyRequest) -> Result<CopyDeck>;
}

pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ImageSlotRequest<'_>) -> Result<RenderedImage>;
}

impl NamedProvider for Box<dyn CopyProvider> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }
}

impl NamedProvider for Box<dyn ImageProvider> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }
}

/// Deterministic offline copywriter. Titles and texts are derived from the
/// prompt so repeated runs are stable.
pub struct DryrunCopywriter;

impl CopyProvider for DryrunCopywriter {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &CopyRequest) -> Result<CopyDeck> {
        let entries = (0..request.variations)
            .map(|slot| CopyEntry {
                title: format!("Concept {} {}", slot + 1, short_id(&request.prompt, slot as u64)),
                text: format!(
                    "Offline stand-in copy for variation {}. Token {}.",
                    slot + 1,
                    short_id(&request.prompt, (slot + request.variations) as u64)
                ),
            })
            .collect();
        Ok(CopyDeck {
            entries,
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": {
                    "prompt": request.prompt,
                    "variations": request.variations,
                },
            })),
            provider_response: map_object(json!({
                "status": "ok",
                "model": request.model,
            })),
            warnings: Vec::new(),
        })
    }
}

/// Deterministic offline image studio: a solid color derived from the prompt
/// and slot, at the placement's native dimensions.
pub struct DryrunImageStudio;

impl ImageProvider for DryrunImageStudio {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &ImageSlotRequest<'_>) -> Result<RenderedImage> {
        let (width, height) = dims_for_format(request.aspect_ratio);
        let (r, g, b) = color_from_prompt(request.prompt, request.slot as u64);
        let mut canvas = RgbImage::new(width, height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .context("dryrun image encode failed")?;
        Ok(RenderedImage {
            bytes,
            mime_type: "image/png".to_string(),
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": {
                    "prompt": request.prompt,
                    "slot": request.slot,
                    "aspect_ratio": request.aspect_ratio.as_str(),
                    "references": request.references.len(),
                },
            })),
            provider_response: map_object(json!({
                "status": "ok",
                "model": request.model,
                "width": width,
                "height": height,
            })),
            warnings: Vec::new(),
        })
    }
}

pub struct GeminiCopywriter {
    api_base: String,
    http: HttpClient,
}

impl GeminiCopywriter {
    pub fn new() -> Self {
        Self {
            api_base: gemini_api_base(),
            http: untimed_http_client(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        gemini_endpoint(&self.api_base, model)
    }

    fn copy_deck_schema(variations: usize) -> Value {
        json!({
            "type": "ARRAY",
            "minItems": variations,
            "maxItems": variations,
            "items": {
                "type": "OBJECT",
                "properties": {
                    "title": {"type": "STRING"},
                    "text": {"type": "STRING"},
                },
                "required": ["title", "text"],
                "propertyOrdering": ["title", "text"],
            },
        })
    }

    fn build_payload(request: &CopyRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": request.prompt}],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::copy_deck_schema(request.variations),
            },
        })
    }

    fn extract_text(response_payload: &Value) -> String {
        let mut out = String::new();
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for candidate in candidates {
            let parts = candidate
                .get("content")
                .and_then(Value::as_object)
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                }
            }
        }
        out
    }

    fn parse_entries(raw: &str) -> Result<Vec<CopyEntry>> {
        serde_json::from_str(raw.trim())
            .context("Gemini copy response did not match the declared schema")
    }
}

impl Default for GeminiCopywriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyProvider for GeminiCopywriter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &CopyRequest) -> Result<CopyDeck> {
        let Some(api_key) = gemini_api_key() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let raw_text = Self::extract_text(&response_payload);
        if raw_text.trim().is_empty() {
            bail!("Gemini copy response contained no text part");
        }
        let entries = Self::parse_entries(&raw_text)?;
        Ok(CopyDeck {
            entries,
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response: map_object(json!({
                "candidates": response_payload
                    .get("candidates")
                    .and_then(Value::as_array)
                    .map(|rows| rows.len())
                    .unwrap_or(0),
                "usage_metadata": response_payload.get("usageMetadata").cloned().unwrap_or(Value::Null),
            })),
            warnings: Vec::new(),
        })
    }
}

pub struct GeminiImageStudio {
    api_base: String,
    http: HttpClient,
}

impl GeminiImageStudio {
    pub fn new() -> Self {
        Self {
            api_base: gemini_api_base(),
            http: untimed_http_client(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        gemini_endpoint(&self.api_base, model)
    }

    /// `imageConfig.aspectRatio` has no `1.91:1`; the landscape placement
    /// snaps to the nearest supported ratio.
    fn aspect_ratio_for(format: AdFormat, warnings: &mut Vec<String>) -> &'static str {
        match format {
            AdFormat::Square => "1:1",
            AdFormat::Vertical => "9:16",
            AdFormat::Landscape => {
                push_unique_warning(
                    warnings,
                    "Gemini aspect ratio 1.91:1 snapped to 16:9.".to_string(),
                );
                "16:9"
            }
        }
    }

    fn default_safety_settings() -> Vec<Value> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| {
            json!({
                "category": category,
                "threshold": "OFF",
            })
        })
        .collect()
    }

    fn build_payload(request: &ImageSlotRequest<'_>, warnings: &mut Vec<String>) -> Value {
        let mut parts: Vec<Value> = request
            .references
            .iter()
            .map(|reference| {
                json!({
                    "inlineData": {
                        "mimeType": reference.payload.mime_type,
                        "data": reference.payload.data,
                    }
                })
            })
            .collect();
        parts.push(json!({ "text": request.prompt }));
        json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "candidateCount": 1,
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": Self::aspect_ratio_for(request.aspect_ratio, warnings),
                },
            },
            "safetySettings": Self::default_safety_settings(),
        })
    }

    /// First image-bearing part of the response, decoded.
    fn extract_inline_image(response_payload: &Value) -> Result<Option<(Vec<u8>, String)>> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for candidate in candidates {
            let parts = candidate
                .get("content")
                .and_then(Value::as_object)
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for part in parts {
                let inline = part
                    .get("inlineData")
                    .or_else(|| part.get("inline_data"))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64
                    .decode(data.as_bytes())
                    .context("Gemini image base64 decode failed")?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string();
                return Ok(Some((bytes, mime_type)));
            }
        }
        Ok(None)
    }
}

impl Default for GeminiImageStudio {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for GeminiImageStudio {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &ImageSlotRequest<'_>) -> Result<RenderedImage> {
        let Some(api_key) = gemini_api_key() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(request.model);
        let mut warnings = Vec::new();
        let payload = Self::build_payload(request, &mut warnings);
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;
        let Some((bytes, mime_type)) = Self::extract_inline_image(&response_payload)? else {
            bail!("Gemini response contained no image part");
        };
        Ok(RenderedImage {
            bytes,
            mime_type,
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response: map_object(json!({
                "candidates": response_payload
                    .get("candidates")
                    .and_then(Value::as_array)
                    .map(|rows| rows.len())
                    .unwrap_or(0),
                "usage_metadata": response_payload.get("usageMetadata").cloned().unwrap_or(Value::Null),
            })),
            warnings,
        })
    }
}

pub fn default_copy_registry() -> ProviderRegistry<Box<dyn CopyProvider>> {
    let mut registry = ProviderRegistry::default();
    registry.register(Box::new(GeminiCopywriter::new()) as Box<dyn CopyProvider>);
    registry.register(Box::new(DryrunCopywriter) as Box<dyn CopyProvider>);
    registry
}

pub fn default_image_registry() -> ProviderRegistry<Box<dyn ImageProvider>> {
    let mut registry = ProviderRegistry::default();
    registry.register(Box::new(GeminiImageStudio::new()) as Box<dyn ImageProvider>);
    registry.register(Box::new(DryrunImageStudio) as Box<dyn ImageProvider>);
    registry
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub creatives: Vec<Creative>,
    pub manifest_path: PathBuf,
    pub warnings: Vec<String>,
}

/// Owns one run directory and its event log. One `generate_batch` call is
/// one submission: it either writes a full manifest of six creatives or
/// leaves the directory without any.
pub struct CreativeEngine {
    run_dir: PathBuf,
    run_id: String,
    events: EventWriter,
    started_at: String,
    models: ModelRegistry,
    text_model: Option<String>,
    image_model: Option<String>,
    copy_providers: ProviderRegistry<Box<dyn CopyProvider>>,
    image_providers: ProviderRegistry<Box<dyn ImageProvider>>,
    batches: u64,
    creatives_written: u64,
}

impl CreativeEngine {
    pub fn new(
        run_dir: impl Into<PathBuf>,
        events_path: impl Into<PathBuf>,
        text_model: Option<String>,
        image_model: Option<String>,
    ) -> Result<Self> {
        let run_dir = run_dir.into();
        fs::create_dir_all(&run_dir)?;
        let run_id = run_dir
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("run")
            .to_string();
        let events = EventWriter::new(events_path.into(), run_id.clone());
        let started_at = now_utc_iso();

        events.emit(
            "run_started",
            json!({
                "out_dir": run_dir.to_string_lossy().to_string(),
            }),
        )?;

        Ok(Self {
            run_dir,
            run_id,
            events,
            started_at,
            models: ModelRegistry::new(None),
            text_model,
            image_model,
            copy_providers: default_copy_registry(),
            image_providers: default_image_registry(),
            batches: 0,
            creatives_written: 0,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    pub fn set_copy_providers(&mut self, providers: ProviderRegistry<Box<dyn CopyProvider>>) {
        self.copy_providers = providers;
    }

    pub fn set_image_providers(&mut self, providers: ProviderRegistry<Box<dyn ImageProvider>>) {
        self.image_providers = providers;
    }

    pub fn generate_batch(
        &mut self,
        brief: &CampaignBrief,
        references: &ReferenceSet,
    ) -> Result<BatchOutcome> {
        match self.execute_batch(brief, references) {
            Ok(outcome) => {
                self.batches += 1;
                self.creatives_written += outcome.creatives.len() as u64;
                Ok(outcome)
            }
            Err(err) => {
                let _ = self.events.emit(
                    "batch_failed",
                    json!({
                        "error": error_chain_text(&err, 400),
                    }),
                );
                Err(err)
            }
        }
    }

    fn execute_batch(
        &mut self,
        brief: &CampaignBrief,
        references: &ReferenceSet,
    ) -> Result<BatchOutcome> {
        if let Err(message) = brief.validate(references.len()) {
            bail!("invalid brief: {message}");
        }

        // Entering the loading state: a previous batch in this directory is
        // cleared before any upstream call so sequential runs never mix.
        clear_previous_batch(&self.run_dir)?;

        let batch_id = uuid::Uuid::new_v4().to_string();
        self.events.emit(
            "batch_started",
            json!({
                "batch_id": batch_id,
                "product": brief.product,
                "ad_format": brief.ad_format.as_str(),
                "tone": brief.tone.as_str(),
                "references": references.len(),
            }),
        )?;

        let encoded = encode_reference_set(references)?;
        let prompts = build_prompts(brief);

        let text_selection = self
            .models
            .resolve(self.text_model.as_deref(), "text")
            .map_err(anyhow::Error::msg)?;
        let image_selection = self
            .models
            .resolve(self.image_model.as_deref(), "image")
            .map_err(anyhow::Error::msg)?;

        let mut warnings = Vec::new();
        for selection in [&text_selection, &image_selection] {
            if let Some(reason) = &selection.fallback_reason {
                push_unique_warning(&mut warnings, reason.clone());
            }
        }

        let copy_provider = self
            .copy_providers
            .get(&text_selection.model.provider)
            .with_context(|| {
                format!(
                    "no copy provider registered for '{}'",
                    text_selection.model.provider
                )
            })?;
        let image_provider = self
            .image_providers
            .get(&image_selection.model.provider)
            .with_context(|| {
                format!(
                    "no image provider registered for '{}'",
                    image_selection.model.provider
                )
            })?;

        let copy_request = CopyRequest {
            prompt: prompts.copy_prompt.clone(),
            variations: CREATIVE_BATCH_SIZE,
            model: text_selection.model.name.clone(),
        };

        self.events.emit(
            "fanout_started",
            json!({
                "batch_id": batch_id,
                "requests": CREATIVE_BATCH_SIZE + 1,
                "text_model": text_selection.model.name,
                "image_model": image_selection.model.name,
            }),
        )?;

        // One copy request and six image requests, issued without waiting on
        // each other and joined together. The first failing slot fails the
        // whole batch, with the slot kept in the error chain.
        let (copy_result, image_results) = thread::scope(|scope| {
            let copy_handle = scope.spawn(|| timed(|| copy_provider.generate(&copy_request)));
            let image_handles: Vec<_> = (0..CREATIVE_BATCH_SIZE)
                .map(|slot| {
                    let request = ImageSlotRequest {
                        prompt: &prompts.image_prompt,
                        slot,
                        model: &image_selection.model.name,
                        aspect_ratio: brief.ad_format,
                        references: &encoded,
                    };
                    scope.spawn(move || timed(|| image_provider.generate(&request)))
                })
                .collect();
            let copy_result = join_worker(copy_handle);
            let image_results: Vec<_> = image_handles.into_iter().map(join_worker).collect();
            (copy_result, image_results)
        });

        let (deck, copy_latency) = copy_result.context("copy deck generation failed")?;
        let mut images = Vec::with_capacity(CREATIVE_BATCH_SIZE);
        for (slot, result) in image_results.into_iter().enumerate() {
            let item = result.with_context(|| format!("image variation {slot} failed"))?;
            images.push(item);
        }

        if deck.entries.len() != CREATIVE_BATCH_SIZE {
            bail!(
                "copy deck returned {} variations, expected {CREATIVE_BATCH_SIZE}",
                deck.entries.len()
            );
        }
        for (slot, entry) in deck.entries.iter().enumerate() {
            if entry.is_blank() {
                bail!("copy variation {slot} was blank");
            }
        }
        for warning in &deck.warnings {
            push_unique_warning(&mut warnings, warning.clone());
        }

        let mut slot_records = vec![SlotRecord {
            slot: "copy".to_string(),
            provider_request: deck.provider_request.clone(),
            provider_response: deck.provider_response.clone(),
            latency_s: copy_latency,
        }];

        let mut creatives = Vec::with_capacity(CREATIVE_BATCH_SIZE);
        for (slot, (image, latency)) in images.into_iter().enumerate() {
            for warning in &image.warnings {
                push_unique_warning(&mut warnings, warning.clone());
            }
            let ext = extension_from_mime(&image.mime_type);
            let file_name = format!("creative-{slot}.{ext}");
            let image_path = self.run_dir.join(&file_name);
            fs::write(&image_path, &image.bytes)
                .with_context(|| format!("failed to write {}", image_path.display()))?;
            let dims = image::load_from_memory(&image.bytes)
                .ok()
                .map(|decoded| (decoded.width(), decoded.height()));
            if dims.is_none() {
                push_unique_warning(
                    &mut warnings,
                    format!("creative {slot} could not be decoded for dimensions"),
                );
            }
            slot_records.push(SlotRecord {
                slot: format!("image-{slot}"),
                provider_request: image.provider_request,
                provider_response: image.provider_response,
                latency_s: latency,
            });

            let entry = &deck.entries[slot];
            creatives.push(Creative {
                id: slot,
                image_path: file_name,
                mime_type: image.mime_type,
                title: entry.title.clone(),
                text: entry.text.clone(),
                aspect_ratio: brief.ad_format.as_str().to_string(),
                width: dims.map(|value| value.0),
                height: dims.map(|value| value.1),
            });
        }

        let manifest = BatchManifest {
            batch_id: batch_id.clone(),
            created_at: now_utc_iso(),
            brief: brief.clone(),
            text_model: text_selection.model.name.clone(),
            image_model: image_selection.model.name.clone(),
            warnings: warnings.clone(),
            creatives: creatives.clone(),
        };
        let manifest_path = self.run_dir.join(MANIFEST_FILE_NAME);
        manifest.write(&manifest_path)?;

        let reference_rows: Vec<Value> = encoded
            .iter()
            .map(|reference| {
                json!({
                    "id": reference.id,
                    "mime_type": reference.payload.mime_type,
                    "sha256": reference.digest,
                })
            })
            .collect();
        let request_record = json!({
            "batch_id": batch_id,
            "brief": brief,
            "prompts": {
                "copy": prompts.copy_prompt,
                "image": prompts.image_prompt,
            },
            "references": reference_rows,
            "text_model": text_selection.model.name,
            "image_model": image_selection.model.name,
        });
        let receipt_path = self.run_dir.join(format!("receipt-{batch_id}.json"));
        let receipt = build_receipt(
            &request_record,
            &slot_records,
            &warnings,
            &manifest_path,
            &receipt_path,
        );
        write_receipt(&receipt_path, &receipt)?;

        self.events.emit(
            "batch_completed",
            json!({
                "batch_id": batch_id,
                "creatives": creatives.len(),
                "manifest": manifest_path.to_string_lossy().to_string(),
                "warnings": warnings.len(),
            }),
        )?;

        Ok(BatchOutcome {
            batch_id,
            creatives,
            manifest_path,
            warnings,
        })
    }

    pub fn finish(&mut self, status: &str) -> Result<()> {
        let summary = RunSummary {
            run_id: self.run_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            status: status.to_string(),
            batches: self.batches,
            creatives: self.creatives_written,
        };
        write_summary(&self.run_dir.join("summary.json"), &summary, None)?;
        self.events.emit(
            "run_finished",
            json!({
                "status": status,
                "batches": self.batches,
                "creatives": self.creatives_written,
            }),
        )?;
        Ok(())
    }
}

fn clear_previous_batch(run_dir: &Path) -> Result<()> {
    if !run_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(run_dir)
        .with_context(|| format!("failed listing {}", run_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name == MANIFEST_FILE_NAME || name.starts_with("creative-") {
            fs::remove_file(entry.path())
                .with_context(|| format!("failed removing stale {}", name))?;
        }
    }
    Ok(())
}

fn timed<T>(work: impl FnOnce() -> Result<T>) -> Result<(T, f64)> {
    let start = Instant::now();
    work().map(|value| (value, start.elapsed().as_secs_f64()))
}

fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("generation worker panicked"))?
}

fn gemini_api_base() -> String {
    non_empty_env("ADFORGE_GEMINI_API_BASE")
        .or_else(|| non_empty_env("GEMINI_API_BASE"))
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .unwrap_or_else(|| GEMINI_DEFAULT_API_BASE.to_string())
}

fn gemini_api_key() -> Option<String> {
    non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
}

fn gemini_endpoint(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

/// The orchestration waits on the upstream service without a client-side
/// deadline; the blocking client would otherwise enforce its 30s default.
fn untimed_http_client() -> HttpClient {
    HttpClient::builder()
        .timeout(None::<Duration>)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() {
        return;
    }
    if warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn extension_from_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn dims_for_format(format: AdFormat) -> (u32, u32) {
    match format {
        AdFormat::Square => (1080, 1080),
        AdFormat::Vertical => (1080, 1920),
        AdFormat::Landscape => (1200, 628),
    }
}

fn color_from_prompt(prompt: &str, slot: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(slot.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str, idx: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(idx.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}

fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}
