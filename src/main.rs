//! chirograph - print a tally-stick certificate sheet.

use chirograph::{
    CertificateSpec, Chirograph, ChirographError, EntropySource, OutputFormat, RandomSource,
    SeededSource, write_output_atomic,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_LABEL: &str = "hello world!";

/// Render a certificate sheet with randomized cut lines.
#[derive(Parser, Debug)]
#[command(name = "chirograph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Words of the certificate label, joined with spaces
    content: Vec<String>,

    /// Output prefix; the format extension is appended. Empty writes to stdout
    #[arg(short, long, default_value = "out")]
    out: String,

    /// Output format: svg, pdf, eps or png
    #[arg(short, long, default_value = "pdf")]
    format: String,

    /// Full certificate as JSON; overrides the label
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Seed for reproducible cut lines
    #[arg(long)]
    seed: Option<u64>,

    /// TrueType font to embed
    #[arg(long)]
    font: Option<PathBuf>,

    /// PNG resolution
    #[arg(long, default_value_t = chirograph::DEFAULT_DPI)]
    dpi: u32,

    /// Draw the block grid behind the content
    #[arg(long)]
    grid: bool,

    /// Tint label and mail-to backdrops
    #[arg(long)]
    colorize: bool,

    /// JSON-lines debug log
    #[arg(long)]
    debug_log: Option<PathBuf>,

    /// JSON-lines timing log
    #[arg(long)]
    perf_log: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ ChirographError::UnsupportedFormat(_)) => {
            eprintln!("chirograph: {err}");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("chirograph: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ChirographError> {
    // Checked before anything is composed or written.
    let format: OutputFormat = cli.format.parse()?;
    let spec = load_certificate(&cli)?;

    let mut builder = Chirograph::builder()
        .draw_grid(cli.grid)
        .colorize(cli.colorize)
        .raster_dpi(cli.dpi)
        .document_title(spec.label.clone());
    if let Some(font) = &cli.font {
        builder = builder.register_font_file(font);
    }
    if let Some(path) = &cli.debug_log {
        builder = builder.debug_log(path);
    }
    if let Some(path) = &cli.perf_log {
        builder = builder.perf_log(path);
    }
    let engine = builder.build()?;

    let mut random: Box<dyn RandomSource> = match cli.seed {
        Some(seed) => Box::new(SeededSource::new(seed)),
        None => Box::new(EntropySource::new()?),
    };
    let composed = engine.compose(&spec, random.as_mut())?;
    let bytes = engine.render(&composed.document, format)?;
    tracing::info!(
        fingerprint = %composed.document.fingerprint(),
        content = %composed.document.fingerprint_without_cuts(),
        %format,
        "sheet composed"
    );

    if cli.out.is_empty() {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
    } else {
        let path = format.output_path(&cli.out);
        write_output_atomic(&path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote sheet");
    }
    engine.flush_logs();
    Ok(())
}

fn load_certificate(cli: &Cli) -> Result<CertificateSpec, ChirographError> {
    if let Some(path) = &cli.spec {
        let raw = std::fs::read_to_string(path)?;
        return CertificateSpec::from_json(&raw);
    }
    let label = if cli.content.is_empty() {
        eprintln!("usage: chirograph [OPTIONS] [CONTENT]... (see --help); using \"{DEFAULT_LABEL}\"");
        DEFAULT_LABEL.to_string()
    } else {
        cli.content.join(" ")
    };
    Ok(CertificateSpec::placeholder(label).with_default_helpers())
}
