use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use doc_model::Preferences;
use pdf_engine::{default_engine, ExportReport, OpenSource, PdfEngine, ThumbnailSize};
use serde::Serialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::Storage;
use viewer_core::Session;

pub mod script;

/// Overrides the `-v` flags, e.g. `BLACKLINE_LOG=debug`.
const LOG_ENV: &str = "BLACKLINE_LOG";

#[derive(Debug, Parser)]
#[command(name = "blackline-cli")]
#[command(about = "Inspect PDFs and burn redactions and text into a copy")]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Directory holding preferences.json instead of the platform default.
    #[arg(long, value_name = "DIR", global = true)]
    prefs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a thumbnail PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 140)]
        width: u32,
        #[arg(long, default_value_t = 180)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay an overlay script and write the redacted copy.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON overlay script.
        #[arg(long, value_name = "JSON")]
        overlays: PathBuf,
        #[arg(long, value_name = "PDF")]
        output: PathBuf,
    },
    /// Print the stored preferences.
    Prefs {
        /// Delete stored preferences and print the defaults.
        #[arg(long)]
        reset: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    output: String,
    #[serde(flatten)]
    report: ExportReport,
    discarded_actions: usize,
}

#[derive(Debug, Serialize)]
struct PrefsOutput {
    path: String,
    preferences: Preferences,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::RenderThumb { file, page, width, height, output } => {
            run_render_thumb(&file, page, width, height, output.as_deref())
        }
        Commands::Export { file, overlays, output } => {
            run_export(&file, &overlays, &output, cli.prefs_dir.as_deref())
        }
        Commands::Prefs { reset } => run_prefs(reset, cli.prefs_dir.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let from_env = std::env::var(LOG_ENV).ok().and_then(|value| value.parse::<LevelFilter>().ok());
    let level = from_env.unwrap_or(match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });

    // A logger may already be installed when `run` is called more than once.
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Never);
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let pages = (0..page_count)
        .map(|page| -> Result<PageSizeOutput> {
            let size = engine.page_size(handle, page)?;
            Ok(PageSizeOutput { width: size.width_pt, height: size.height_pt })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    width: u32,
    height: u32,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_index = page - 1;
    let image = engine
        .render_thumbnail(handle, page_index, ThumbnailSize { width_px: width, height_px: height })
        .context("failed to render thumbnail")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_export(file: &Path, overlays: &Path, output: &Path, prefs_dir: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let script = script::load(overlays)?;
    let preferences = open_storage(prefs_dir)?.load_preferences().context("failed to load preferences")?;

    let mut session =
        Session::open(default_engine(), OpenSource::from(file), &preferences).context("failed to open PDF")?;
    let summary = script::replay(&mut session, &script)?;

    let report = session
        .export(output)
        .with_context(|| format!("failed to export to {}", output.display()))?;
    session.close()?;

    let payload = ExportOutput {
        output: output.display().to_string(),
        report,
        discarded_actions: summary.discarded,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_prefs(reset: bool, prefs_dir: Option<&Path>) -> Result<()> {
    let storage = open_storage(prefs_dir)?;

    if reset {
        storage.reset_preferences().context("failed to reset preferences")?;
    }
    let preferences = storage.load_preferences().context("failed to load preferences")?;

    let payload =
        PrefsOutput { path: storage.preferences_path().display().to_string(), preferences };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn open_storage(prefs_dir: Option<&Path>) -> Result<Storage> {
    match prefs_dir {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project().context("failed to locate preferences directory"),
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_thumbnail_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
