//! sigdoc command line. Replays a recorded signature against a record
//! and writes the agreement PDF.
//!
//! The event file holds the same pointer/resize events the signing page
//! forwards (`[{"type":"pointerDown","x":..,"y":..,"timestampMs":..}, ...]`).

use chrono::NaiveDate;
use clap::Parser;
use sigdoc_core::{CanvasGeometry, MemoryStore, RecordDraft, RenderMode, SelectionCache};
use sigdoc_ink::{AgreementFlow, InputEvent, Step};
use sigdoc_render::{CaptureConfig, DirectorySink, InkStyle, PdfBackend, RenderOutput};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// CSV with name, assetName, assetId (and optionally additionalAssets) columns.
    #[arg(long, conflicts_with = "name")]
    csv: Option<PathBuf>,

    /// Narrow the CSV records before selecting (matches name, asset or id).
    #[arg(long, requires = "csv")]
    query: Option<String>,

    /// Position in the (filtered) CSV records when there are several.
    #[arg(long, requires = "csv")]
    select: Option<usize>,

    /// Manual entry: employee name.
    #[arg(long, requires_all = ["asset_name", "asset_id"])]
    name: Option<String>,

    #[arg(long)]
    asset_name: Option<String>,

    #[arg(long)]
    asset_id: Option<String>,

    /// Additional asset listed on the agreement. Repeatable.
    #[arg(long = "extra")]
    extra: Vec<String>,

    /// Recorded input events (JSON array).
    #[arg(long)]
    events: PathBuf,

    /// Canvas size in CSS pixels; defaults to the first resize event.
    #[arg(long, requires = "height")]
    width: Option<f32>,

    #[arg(long, requires = "width")]
    height: Option<f32>,

    #[arg(long, default_value_t = 1.0)]
    dpr: f32,

    /// Capture tuning as JSON, e.g. `{"minWidth":0.5,"maxWidth":2.5}`.
    #[arg(long)]
    capture: Option<String>,

    /// Agreement date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Directory the agreement is saved into.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Write a preview to this path instead of saving under the agreement name.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Also write the finalized signature PNG here.
    #[arg(long)]
    signature_png: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {what}: {source}")]
    Json {
        what: &'static str,
        source: serde_json::Error,
    },

    #[error("{count} records loaded; pass --select to choose one")]
    SelectionNeeded { count: usize },

    #[error(transparent)]
    Flow(#[from] sigdoc_core::Error),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("sigdoc: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns where the agreement was written.
fn run(args: &Args) -> Result<PathBuf, CliError> {
    let config = match &args.capture {
        Some(json) => serde_json::from_str(json).map_err(|source| CliError::Json {
            what: "capture config",
            source,
        })?,
        None => CaptureConfig::default(),
    };
    let events: Vec<InputEvent> =
        serde_json::from_str(&read(&args.events)?).map_err(|source| CliError::Json {
            what: "event file",
            source,
        })?;

    let mut flow = AgreementFlow::new(
        SelectionCache::new(MemoryStore::new()),
        config,
        InkStyle::default(),
    );
    select_record(&mut flow, args)?;
    flow.set_extra_items(args.extra.clone());

    flow.open_signing(initial_geometry(args, &events))?;
    let accepted = events.iter().filter(|e| flow.handle(e)).count();
    log::debug!("{accepted} of {} events changed the signature", events.len());
    flow.finalize_signing()?;

    if let (Some(path), Some(signature)) = (&args.signature_png, flow.signature()) {
        write(path, &signature.image.bytes)?;
    }

    let today = args
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut backend = PdfBackend::new(DirectorySink::new(&args.out));
    match &args.preview {
        Some(path) => {
            if let RenderOutput::Inline(bytes) =
                flow.render(&mut backend, RenderMode::Preview, today)?
            {
                write(path, &bytes)?;
            }
            Ok(path.clone())
        }
        None => match flow.render(&mut backend, RenderMode::Download, today)? {
            RenderOutput::Saved { filename } => Ok(args.out.join(filename)),
            RenderOutput::Inline(_) => Ok(args.out.clone()),
        },
    }
}

fn select_record(flow: &mut AgreementFlow<MemoryStore>, args: &Args) -> Result<(), CliError> {
    match &args.csv {
        Some(path) => {
            let step = flow.load_csv(&read(path)?, 0)?;
            if step == Step::Selecting {
                if let Some(query) = &args.query {
                    flow.set_query(query);
                }
                let count = flow.filtered().len();
                match args.select {
                    Some(index) => {
                        flow.select(index, 0)?;
                    }
                    None if count == 1 => {
                        flow.select(0, 0)?;
                    }
                    None => return Err(CliError::SelectionNeeded { count }),
                }
            }
        }
        None => {
            let draft = RecordDraft {
                name: args.name.clone().unwrap_or_default(),
                asset_name: args.asset_name.clone().unwrap_or_default(),
                asset_id: args.asset_id.clone().unwrap_or_default(),
                additional_assets: Vec::new(),
            };
            flow.submit_manual(&draft, 0)?;
        }
    }
    if let Some(record) = flow.selected() {
        log::info!("signing for {} ({})", record.name, record.asset_id);
    }
    Ok(())
}

/// `--width/--height` win; otherwise the first resize event; otherwise
/// the fallback canvas.
fn initial_geometry(args: &Args, events: &[InputEvent]) -> CanvasGeometry {
    if let (Some(width), Some(height)) = (args.width, args.height) {
        return CanvasGeometry::or_fallback(width, height, args.dpr);
    }
    events
        .iter()
        .find_map(|e| match *e {
            InputEvent::Resize {
                width,
                height,
                device_pixel_ratio,
            } => Some(CanvasGeometry::or_fallback(width, height, device_pixel_ratio)),
            _ => None,
        })
        .unwrap_or(CanvasGeometry::FALLBACK)
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}
