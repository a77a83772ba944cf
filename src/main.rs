use agv_proc::imaging::{Compositor, GridScanner, decode_source};
use agv_proc::ocr::{self, OcrOutcome};
use agv_proc::types::Dni;
use agv_proc::{config, output, pipeline, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agv-proc")]
#[command(about = "Branded DNI card generator")]
#[command(long_about = "\
Branded DNI card generator

Fetches the card image for a DNI from the upstream service, reads its text
with tesseract, finds the photographic regions with a grid scanner, and
composes a new PNG with background, logo, thumbnails and reflowed text.

  GET /agv-proc?dni=12345678   → JSON with urls.FILE pointing at the PNG
  GET /status                  → liveness

The scan and render commands run the same steps on a local file, without
the upstream, for tuning thresholds and layout.

Run 'agv-proc gen-config' to generate a documented agv-proc.toml.
Log verbosity follows RUST_LOG (default: info).")]
#[command(version)]
struct Cli {
    /// Configuration file (stock defaults when absent)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Print grid statistics and ranked candidates for a local image
    Scan {
        /// Source card image
        #[arg(long)]
        input: PathBuf,
    },
    /// Render a card from a local image without contacting the upstream
    Render {
        /// Source card image
        #[arg(long)]
        input: PathBuf,
        /// Identifier shown in the title
        #[arg(long)]
        dni: String,
        /// Output PNG
        #[arg(long, default_value = "card.png")]
        out: PathBuf,
        /// Skip text recognition
        #[arg(long)]
        no_ocr: bool,
    },
    /// Print a stock agv-proc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Serve => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(&config))?;
        }
        Command::Scan { input } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let image = decode_source(&std::fs::read(&input)?)?;
            let scanner = GridScanner::new(config.scanner.clone());
            let cells = scanner.score_cells(&image);
            let candidates = scanner.detect(&image);
            output::print_scan_output(
                image.dimensions(),
                (config.scanner.cols, config.scanner.rows),
                &cells,
                &candidates,
            );
        }
        Command::Render {
            input,
            dni,
            out,
            no_ocr,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let dni = Dni::parse(&dni)?;
            let source = std::fs::read(&input)?;

            let ocr = if no_ocr {
                OcrOutcome::default()
            } else {
                let recognizer = ocr::recognizer_from_config(&config.ocr);
                ocr::recognize_or_empty(recognizer.as_ref(), &source)
            };
            let card = pipeline::render_card(
                &GridScanner::new(config.scanner.clone()),
                &Compositor::new(config.canvas.clone(), config.assets.clone()),
                &source,
                &ocr.lines(),
                dni.as_str(),
            )?;
            std::fs::write(&out, &card.output.png)?;
            output::print_render_report(dni.as_str(), &out, &card.output.report, &ocr);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Size the global rayon pool used by the grid scanner.
///
/// `max_threads` can lower the count below the core count, never raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
