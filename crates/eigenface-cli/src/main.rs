use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eigenface_core::{model, trainer, FaceImage, Recognizer};
use eigenface_data::dataset::{self, DatasetEntry};
use eigenface_data::preprocess::{self, PreprocessOptions};
use eigenface_data::Batch;
use std::path::{Path, PathBuf};

mod config;

use config::{parse_size, Config};

#[derive(Parser)]
#[command(name = "eigenface", about = "Eigenface training and recognition CLI")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an eigenspace model from an annotated dataset directory
    Train {
        /// Directory of face images with same-stem eye annotations
        dataset: PathBuf,
        /// Cumulative energy to retain, in percent (0, 100]
        #[arg(short, long)]
        energy: Option<f64>,
        /// Model output path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Resize normalized faces to WIDTHxHEIGHT before training
        #[arg(long, value_parser = parse_canvas)]
        canvas: Option<(u32, u32)>,
    },
    /// Find the dataset face closest to a query face
    Recognize {
        /// Query face image
        face: PathBuf,
        /// Directory of reference face images
        dataset: PathBuf,
        /// Trained model path
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Eye annotation for the query (default: same-stem file next to it)
        #[arg(long)]
        eyes: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resize source photos and write default eye annotations
    Preprocess {
        /// Directory of source photos
        input: PathBuf,
        /// Output directory; receives pgm/ and eye/ subdirectories
        output: PathBuf,
        /// Extension of the source photos
        #[arg(long, default_value = "jpg")]
        extension: String,
        #[arg(long, default_value_t = 256)]
        width: u32,
        #[arg(long, default_value_t = 256)]
        height: u32,
    },
}

fn parse_canvas(value: &str) -> Result<(u32, u32), String> {
    parse_size(value).ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Train {
            dataset,
            energy,
            output,
            canvas,
        } => {
            if let Some(energy) = energy {
                config.energy_percent = energy;
            }
            if let Some(output) = output {
                config.model_path = output;
            }
            if let Some((w, h)) = canvas {
                config.canvas = Some([w, h]);
            }
            run_train(&config, &dataset)
        }
        Commands::Recognize {
            face,
            dataset,
            model,
            eyes,
            json,
        } => {
            if let Some(model) = model {
                config.model_path = model;
            }
            run_recognize(&config, &face, eyes, &dataset, json)
        }
        Commands::Preprocess {
            input,
            output,
            extension,
            width,
            height,
        } => {
            let options = PreprocessOptions {
                source_extension: extension,
                width,
                height,
            };
            let batch = preprocess::preprocess_directory(&input, &output, &options)
                .with_context(|| format!("preprocessing {}", input.display()))?;
            report_skipped(&batch);
            println!(
                "Preprocessed {} images into {} ({} skipped)",
                batch.items.len(),
                output.display(),
                batch.skipped_count()
            );
            Ok(())
        }
    }
}

fn discover(config: &Config, dir: &Path) -> Result<Vec<DatasetEntry>> {
    let annotations = config.annotation_dir.as_deref().unwrap_or(dir);
    dataset::discover_in(
        dir,
        annotations,
        &config.image_extension,
        &config.annotation_extension,
    )
    .with_context(|| format!("scanning dataset {}", dir.display()))
}

fn report_skipped<T>(batch: &Batch<T>) {
    for item in &batch.skipped {
        eprintln!("Skipped {}: {}", item.path.display(), item.error);
    }
}

fn run_train(config: &Config, dir: &Path) -> Result<()> {
    let energy = config.energy_percent;
    if !(energy > 0.0 && energy <= 100.0) {
        bail!("energy percent must be in the range (0, 100], got {energy}");
    }
    tracing::info!(energy, dataset = %dir.display(), "training");

    let entries = discover(config, dir)?;
    let batch = dataset::assemble_training_set(&entries, &config.alignment(), config.canvas_size());
    report_skipped(&batch);
    if batch.items.is_empty() {
        bail!("no usable images found in {}", dir.display());
    }

    let faces: Vec<FaceImage> = batch.items.into_iter().map(|f| f.face).collect();
    let trained = trainer::train(&faces, energy).context("training eigenspace")?;
    model::save_to_path(&trained, &config.model_path)?;

    println!(
        "Trained on {} images ({} skipped): {} components of {}x{} pixels",
        faces.len(),
        batch.skipped.len(),
        trained.component_count(),
        trained.width(),
        trained.height()
    );
    println!("Model saved to: {}", config.model_path.display());
    Ok(())
}

fn run_recognize(
    config: &Config,
    face: &Path,
    eyes: Option<PathBuf>,
    dir: &Path,
    json: bool,
) -> Result<()> {
    let model = model::load_from_path(&config.model_path)?;
    let size = (model.width(), model.height());
    let alignment = config.alignment();

    let query_entry = DatasetEntry {
        image: face.to_path_buf(),
        annotation: eyes.or_else(|| {
            let sibling = face.with_extension(&config.annotation_extension);
            sibling.is_file().then_some(sibling)
        }),
    };
    let query = dataset::load_probe(&query_entry, &alignment, size)
        .with_context(|| format!("preparing query {}", face.display()))?;

    let entries = discover(config, dir)?;
    let references = dataset::assemble_probes(&entries, &alignment, size);
    report_skipped(&references);

    let mut recognizer = Recognizer::new(model);
    for reference in &references.items {
        recognizer.enroll(reference.label.clone(), &reference.face)?;
    }
    let result = recognizer
        .recognize(&query)
        .with_context(|| format!("matching against {}", dir.display()))?;

    if json {
        let out = serde_json::json!({
            "label": result.label,
            "distance": result.distance,
            "references": recognizer.gallery().len(),
            "skipped": references.skipped_count(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Best match: {} (distance: {})", result.label, result.distance);
    }
    Ok(())
}
