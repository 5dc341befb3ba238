use std::path::PathBuf;

use adforge_contracts::briefs::{AdFormat, CampaignBrief, ToneOfVoice};
use adforge_contracts::references::ReferenceSet;
use adforge_contracts::runs::manifest::{BatchManifest, MANIFEST_FILE_NAME};
use adforge_engine::CreativeEngine;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "adforge", version, about = "Batch ad-creative generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a batch of six creatives from a campaign brief.
    Generate(GenerateArgs),
    /// Export the copy text of an existing batch.
    Export(ExportArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    /// JSON brief file; individual flags override its fields.
    #[arg(long)]
    brief: Option<PathBuf>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    audience: Option<String>,
    #[arg(long)]
    offer: Option<String>,
    /// Placement format: 1:1, 9:16, or 1.91:1.
    #[arg(long)]
    format: Option<String>,
    /// Tone of voice: professional, friendly, playful, bold, or luxury.
    #[arg(long)]
    tone: Option<String>,
    /// Reference image path; repeat for more than one.
    #[arg(long = "reference")]
    references: Vec<PathBuf>,
    /// Run directory for images, manifest, and logs.
    #[arg(long)]
    out: PathBuf,
    /// Event log path (defaults to events.jsonl inside the run directory).
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    /// Provider pair override: gemini (default) or dryrun.
    #[arg(long)]
    provider: Option<String>,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Run directory holding creatives.json.
    #[arg(long)]
    run: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("adforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Export(args) => run_export(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let brief = resolve_brief(&args)?;
    let references = ReferenceSet::from_paths(args.references.clone());

    // Validation is synchronous: an invalid submission never constructs an
    // engine or issues a request.
    if let Err(message) = brief.validate(references.len()) {
        eprintln!("invalid brief: {message}");
        return Ok(2);
    }

    let (text_model, image_model) = resolve_models(&args)?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let mut engine = CreativeEngine::new(&args.out, &events_path, text_model, image_model)?;

    match engine.generate_batch(&brief, &references) {
        Ok(outcome) => {
            for creative in &outcome.creatives {
                println!(
                    "[{}] {} — {}",
                    creative.id,
                    creative.title,
                    engine.run_dir().join(&creative.image_path).display()
                );
            }
            for warning in &outcome.warnings {
                eprintln!("warning: {warning}");
            }
            println!("manifest: {}", outcome.manifest_path.display());
            engine.finish("success")?;
            Ok(0)
        }
        Err(_) => {
            // The indexed cause is already in the event log; the console
            // gets one generic line.
            engine.finish("error")?;
            eprintln!(
                "creative generation failed; details in {}",
                engine.event_writer().path().display()
            );
            Ok(1)
        }
    }
}

fn run_export(args: ExportArgs) -> Result<i32> {
    let manifest_path = args.run.join(MANIFEST_FILE_NAME);
    if !manifest_path.exists() {
        bail!("no creatives found in {}", args.run.display());
    }
    let manifest = BatchManifest::load(&manifest_path)?;
    let rendered = render_copy_export(&manifest);
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.out, rendered)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!(
        "exported {} copy variations to {}",
        manifest.creatives.len(),
        args.out.display()
    );
    Ok(0)
}

fn resolve_brief(args: &GenerateArgs) -> Result<CampaignBrief> {
    let mut brief = match &args.brief {
        Some(path) => CampaignBrief::load(path)?,
        None => CampaignBrief {
            product: String::new(),
            audience: String::new(),
            offer: String::new(),
            ad_format: AdFormat::Square,
            tone: ToneOfVoice::Friendly,
        },
    };
    if let Some(product) = &args.product {
        brief.product = product.clone();
    }
    if let Some(audience) = &args.audience {
        brief.audience = audience.clone();
    }
    if let Some(offer) = &args.offer {
        brief.offer = offer.clone();
    }
    if let Some(format) = &args.format {
        brief.ad_format = AdFormat::parse(format).ok_or_else(|| {
            anyhow!(
                "unknown format '{format}'; expected one of {}",
                option_list(AdFormat::all().iter().map(|value| value.as_str()))
            )
        })?;
    }
    if let Some(tone) = &args.tone {
        brief.tone = ToneOfVoice::parse(tone).ok_or_else(|| {
            anyhow!(
                "unknown tone '{tone}'; expected one of {}",
                option_list(ToneOfVoice::all().iter().map(|value| value.as_str()))
            )
        })?;
    }
    Ok(brief)
}

fn resolve_models(args: &GenerateArgs) -> Result<(Option<String>, Option<String>)> {
    match args.provider.as_deref() {
        None | Some("gemini") => Ok((args.text_model.clone(), args.image_model.clone())),
        Some("dryrun") => Ok((
            Some(
                args.text_model
                    .clone()
                    .unwrap_or_else(|| "dryrun-text-1".to_string()),
            ),
            Some(
                args.image_model
                    .clone()
                    .unwrap_or_else(|| "dryrun-image-1".to_string()),
            ),
        )),
        Some(other) => bail!("unknown provider '{other}'; expected gemini or dryrun"),
    }
}

fn option_list<'a>(options: impl Iterator<Item = &'a str>) -> String {
    options.collect::<Vec<_>>().join(", ")
}

fn render_copy_export(manifest: &BatchManifest) -> String {
    let mut out = String::new();
    for creative in &manifest.creatives {
        out.push_str(&format!(
            "[{}] {}\n{}\n\n",
            creative.id, creative.title, creative.text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use adforge_contracts::briefs::{AdFormat, CampaignBrief, ToneOfVoice};
    use adforge_contracts::runs::manifest::{BatchManifest, Creative};

    use super::{render_copy_export, resolve_brief, resolve_models, GenerateArgs};

    fn generate_args() -> GenerateArgs {
        GenerateArgs {
            brief: None,
            product: Some("bottle".to_string()),
            audience: Some("hikers".to_string()),
            offer: None,
            format: Some("9:16".to_string()),
            tone: Some("bold".to_string()),
            references: vec!["a.png".into()],
            out: "runs/demo".into(),
            events: None,
            text_model: None,
            image_model: None,
            provider: None,
        }
    }

    #[test]
    fn flags_build_a_brief() -> anyhow::Result<()> {
        let brief = resolve_brief(&generate_args())?;
        assert_eq!(brief.product, "bottle");
        assert_eq!(brief.ad_format, AdFormat::Vertical);
        assert_eq!(brief.tone, ToneOfVoice::Bold);
        assert_eq!(brief.offer, "");
        Ok(())
    }

    #[test]
    fn brief_file_fields_survive_unless_overridden() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("brief.json");
        std::fs::write(
            &path,
            r#"{"product":"from-file","audience":"file-audience","offer":"file-offer","ad_format":"1.91:1","tone":"luxury"}"#,
        )?;
        let mut args = generate_args();
        args.brief = Some(path);
        args.audience = None;
        args.format = None;
        args.tone = None;

        let brief = resolve_brief(&args)?;
        assert_eq!(brief.product, "bottle");
        assert_eq!(brief.audience, "file-audience");
        assert_eq!(brief.offer, "file-offer");
        assert_eq!(brief.ad_format, AdFormat::Landscape);
        assert_eq!(brief.tone, ToneOfVoice::Luxury);
        Ok(())
    }

    #[test]
    fn unknown_format_lists_the_options() {
        let mut args = generate_args();
        args.format = Some("4:5".to_string());
        let err = resolve_brief(&args).unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("unknown format '4:5'"));
        assert!(rendered.contains("1:1, 9:16, 1.91:1"));
    }

    #[test]
    fn dryrun_provider_selects_the_dryrun_models() -> anyhow::Result<()> {
        let mut args = generate_args();
        args.provider = Some("dryrun".to_string());
        let (text_model, image_model) = resolve_models(&args)?;
        assert_eq!(text_model.as_deref(), Some("dryrun-text-1"));
        assert_eq!(image_model.as_deref(), Some("dryrun-image-1"));

        args.provider = Some("stability".to_string());
        assert!(resolve_models(&args).is_err());
        Ok(())
    }

    #[test]
    fn export_renders_indexed_title_text_pairs() {
        let manifest = BatchManifest {
            batch_id: "batch-1".to_string(),
            created_at: "2026-08-06T00:00:00+00:00".to_string(),
            brief: CampaignBrief {
                product: "bottle".to_string(),
                audience: "hikers".to_string(),
                offer: String::new(),
                ad_format: AdFormat::Square,
                tone: ToneOfVoice::Friendly,
            },
            text_model: "dryrun-text-1".to_string(),
            image_model: "dryrun-image-1".to_string(),
            warnings: vec![],
            creatives: vec![
                Creative {
                    id: 0,
                    image_path: "creative-0.png".to_string(),
                    mime_type: "image/png".to_string(),
                    title: "First title".to_string(),
                    text: "First body".to_string(),
                    aspect_ratio: "1:1".to_string(),
                    width: Some(1080),
                    height: Some(1080),
                },
                Creative {
                    id: 1,
                    image_path: "creative-1.png".to_string(),
                    mime_type: "image/png".to_string(),
                    title: "Second title".to_string(),
                    text: "Second body".to_string(),
                    aspect_ratio: "1:1".to_string(),
                    width: Some(1080),
                    height: Some(1080),
                },
            ],
        };
        let rendered = render_copy_export(&manifest);
        assert_eq!(
            rendered,
            "[0] First title\nFirst body\n\n[1] Second title\nSecond body\n\n"
        );
    }
}
