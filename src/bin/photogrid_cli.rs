//! PhotoGrid CLI - Bridge interface for the kiosk shell
//!
//! Commands: templates, resolve, render, verify
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on domain failure

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use photogrid_core::{
    ComposedImage, DirAssets, EngineError, Encoding, OutputEmitter, PhotoAsset, Preset,
    RenderConfig, TargetProfile, TemplateCatalog,
};

#[derive(Parser)]
#[command(name = "photogrid-cli")]
#[command(about = "PhotoGrid CLI - template-driven photo compositing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Templates directory (defaults to the built-in catalog)
    #[arg(short, long)]
    templates_dir: Option<PathBuf>,

    /// Root for background and logo references
    #[arg(short, long)]
    assets_dir: Option<PathBuf>,

    /// JSON render configuration (defaults to PHOTOGRID_* environment)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List templates
    Templates {
        /// Only templates taking this many photos
        #[arg(short, long)]
        still_count: Option<u32>,

        /// Include disabled templates
        #[arg(long)]
        all: bool,
    },

    /// Resolve slot rectangles for a target
    Resolve {
        #[arg(short, long)]
        template: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Compose photos into a template
    Render {
        #[arg(short, long)]
        template: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Photo files in capture order
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,

        /// Apply the finish gradient
        #[arg(long)]
        finish: bool,

        /// Output file; without it the image is inlined as base64
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fail if any template changed geometry relative to another catalog
    Verify {
        #[arg(long)]
        against: PathBuf,
    },
}

#[derive(clap::Args)]
struct TargetArgs {
    #[arg(short, long, value_enum, default_value = "print")]
    profile: ProfileArg,

    /// Explicit width; requires --height and overrides the preset size
    #[arg(long, requires = "height")]
    width: Option<u32>,

    #[arg(long, requires = "width")]
    height: Option<u32>,

    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Lossy quality 0-1
    #[arg(short, long)]
    quality: Option<f32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Preview,
    Print,
    Export,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Raw,
    Png,
    Jpeg,
}

impl TargetArgs {
    fn to_profile(&self, emitter: &OutputEmitter) -> Result<TargetProfile, EngineError> {
        let preset = match self.profile {
            ProfileArg::Preview => Preset::Preview,
            ProfileArg::Print => Preset::Print,
            ProfileArg::Export => Preset::Export,
        };
        let mut profile = emitter.profile(preset);

        if let (Some(width), Some(height)) = (self.width, self.height) {
            profile = TargetProfile::explicit(width, height, profile.encoding);
        }

        let encoding = match self.format {
            Some(FormatArg::Raw) => Encoding::Raw,
            Some(FormatArg::Png) => Encoding::Png,
            Some(FormatArg::Jpeg) => Encoding::Jpeg {
                quality: emitter.config().export_quality,
            },
            None => profile.encoding.clone(),
        };
        let encoding = match (encoding, self.quality) {
            (Encoding::Jpeg { .. }, Some(quality)) => Encoding::Jpeg { quality },
            (_, Some(_)) => {
                return Err(EngineError::InvalidTarget(
                    "--quality only applies to jpeg output".to_string(),
                ))
            }
            (encoding, None) => encoding,
        };
        Ok(profile.with_encoding(encoding))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RenderConfig::from_file(path),
        None => RenderConfig::from_env(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            print_json(&serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "kind": "config_error",
            }));
            return ExitCode::FAILURE;
        }
    };

    let catalog = match load_catalog(cli.templates_dir.as_deref()) {
        Ok(c) => c,
        Err(e) => return failure(&e, ExitCode::FAILURE),
    };

    let mut emitter = OutputEmitter::new(catalog).with_config(config);
    if let Some(dir) = &cli.assets_dir {
        emitter = emitter.with_assets(DirAssets::new(dir));
    }

    match cli.command {
        Commands::Templates { still_count, all } => {
            let catalog = emitter.catalog();
            let listed: Vec<_> = if all {
                catalog
                    .list_all()
                    .into_iter()
                    .filter(|t| still_count.map_or(true, |n| t.still_count == n))
                    .collect()
            } else {
                catalog.list_enabled(still_count)
            };

            let templates: Vec<_> = listed
                .iter()
                .map(|t| serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "stillCount": t.still_count,
                    "price": t.price,
                    "aspectRatio": t.aspect_ratio,
                    "aspectLabel": t.aspect_ratio.label(),
                    "previewType": t.preview_type,
                    "canvas": [t.canvas_width, t.canvas_height],
                    "isEnabled": t.is_enabled,
                    "version": t.template_version,
                }))
                .collect();

            print_json(&serde_json::json!(templates));
            ExitCode::SUCCESS
        }

        Commands::Resolve { template, target } => {
            let profile = match target.to_profile(&emitter) {
                Ok(p) => p,
                Err(e) => return failure(&e, ExitCode::from(2)),
            };
            match emitter.resolve(&template, &profile) {
                Ok(geometry) => {
                    print_json(&serde_json::json!({ "success": true, "geometry": geometry }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e, ExitCode::from(2)),
            }
        }

        Commands::Render { template, target, photos, finish, out } => {
            let profile = match target.to_profile(&emitter) {
                Ok(p) => p.with_finish(finish),
                Err(e) => return failure(&e, ExitCode::from(2)),
            };
            let (assets, unreadable) = load_photos(&photos);

            let mut image = match emitter.render(&template, &assets, &profile) {
                Ok(image) => image,
                Err(e) => return failure(&e, ExitCode::from(2)),
            };
            attach_read_errors(&mut image, &unreadable);

            let mut output = serde_json::json!({ "success": true, "image": image });
            match &out {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, &image.data) {
                        return failure(&EngineError::Io(e), ExitCode::FAILURE);
                    }
                    output["output"] = serde_json::json!(path.display().to_string());
                }
                None => {
                    output["dataBase64"] = serde_json::json!(image.data_base64());
                }
            }

            print_json(&output);
            ExitCode::SUCCESS
        }

        Commands::Verify { against } => {
            let previous = match TemplateCatalog::load_from_dir(&against) {
                Ok(c) => c,
                Err(e) => return failure(&e, ExitCode::FAILURE),
            };
            match emitter.catalog().ensure_geometry_frozen(&previous) {
                Ok(()) => {
                    print_json(&serde_json::json!({ "success": true, "checked": previous.len() }));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(&e, ExitCode::from(2)),
            }
        }
    }
}

fn load_catalog(dir: Option<&Path>) -> Result<TemplateCatalog, EngineError> {
    match dir {
        Some(dir) => TemplateCatalog::load_from_dir(dir),
        None => TemplateCatalog::builtin(),
    }
}

/// Unreadable files become empty assets so their slots degrade to placeholders.
/// The read errors come back keyed by capture index.
fn load_photos(paths: &[PathBuf]) -> (Vec<PhotoAsset>, Vec<(usize, String)>) {
    let mut unreadable = vec![];
    let assets = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            PhotoAsset::from_path(i as u32, path).unwrap_or_else(|e| {
                tracing::warn!(photo = %path.display(), "{}", e);
                unreadable.push((i, format!("{}: {}", path.display(), e)));
                PhotoAsset::from_bytes(i as u32, Vec::new())
            })
        })
        .collect();
    (assets, unreadable)
}

/// Replace the placeholder detail of each unreadable photo's slot with its read error.
fn attach_read_errors(image: &mut ComposedImage, unreadable: &[(usize, String)]) {
    for (index, error) in unreadable {
        let Some(slot) = image.geometry.slots.get(*index) else {
            continue;
        };
        for diagnostic in image.diagnostics.iter_mut().filter(|d| d.slot_id == slot.slot_id) {
            diagnostic.detail = Some(error.clone());
        }
    }
}

fn failure(err: &EngineError, code: ExitCode) -> ExitCode {
    tracing::error!("{}", err);
    print_json(&serde_json::json!({
        "success": false,
        "error": err.to_string(),
        "kind": err.kind(),
        "retryable": err.is_retryable(),
    }));
    code
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize output: {}", e),
    }
}
