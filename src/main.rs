use asset_derivatives::config::{self, PipelineConfig};
use asset_derivatives::imaging::rust_backend::is_supported_source;
use asset_derivatives::output;
use asset_derivatives::pipeline::{BuildMode, Pipeline, ProcessEvent, REFERENCE_MARKER};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asset-derivatives")]
#[command(about = "Build-time image derivative pipeline")]
#[command(long_about = "\
Build-time image derivative pipeline

Turns source images into optimized derivatives: one full-size file per output
format, a set of width-bound responsive candidates for the primary format, and
a tiny blurred inline placeholder. Each processed image is described by a
manifest a bundler can import:

  import hero from './img/hero.jpg?optimized'
  // hero = { src, srcSet, placeholder, width, height, formats, blurDataURL }

Derivatives are named <stem>-<hash>.<format> and <stem>-<hash>-<width>w.<format>,
where <hash> changes whenever the source path or any setting changes.

Run 'asset-derivatives gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Output directory for derivatives (overrides `output_dir`)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process asset references and print each manifest as JSON
    Process {
        /// References such as `img/hero.jpg?optimized` (marker optional)
        #[arg(required = true)]
        references: Vec<String>,
    },
    /// Process every supported image under a directory
    Build {
        /// Directory to scan for source images
        dir: PathBuf,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Process { references } => {
            let config = load_config(&cli.config, cli.output.as_deref())?;
            init_thread_pool(&config.processing);

            let references: Vec<String> = references.iter().map(|r| with_marker(r)).collect();
            let (pipeline, printer) = pipeline_with_printer(config);
            pipeline.config_resolved(BuildMode::Build)?;

            let results = pipeline.process_all(&references);
            let summary = pipeline.finalize()?;
            let cache = pipeline.cache_stats();
            drop(pipeline);
            join_printer(printer);

            let mut failed = 0;
            for (reference, result) in references.iter().zip(results) {
                match result {
                    Ok(Some(entry)) => println!("{}", entry.manifest.to_json()?),
                    Ok(None) => {}
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", reference, e);
                    }
                }
            }
            for line in output::format_build_summary(&summary, &cache) {
                eprintln!("{}", line);
            }
            if failed > 0 {
                return Err(format!("{} reference(s) could not be resolved", failed).into());
            }
        }
        Command::Build { dir } => {
            let config = load_config(&cli.config, cli.output.as_deref())?;
            init_thread_pool(&config.processing);

            println!("==> Scanning {}", dir.display());
            let references = collect_references(&dir)?;

            let (pipeline, printer) = pipeline_with_printer(config);
            pipeline.config_resolved(BuildMode::Build)?;

            println!("==> Processing images");
            let results = pipeline.process_all(&references);

            println!("==> Writing derivatives");
            let summary = pipeline.finalize()?;
            let cache = pipeline.cache_stats();
            drop(pipeline);
            join_printer(printer);

            let mut entries = Vec::new();
            for (reference, result) in references.iter().zip(&results) {
                match result {
                    Ok(Some(entry)) => entries.push(entry.as_ref()),
                    Ok(None) => {}
                    Err(e) => eprintln!("{}: {}", reference, e),
                }
            }
            output::print_build_output(&entries, &summary, &cache);
            println!("==> Build complete: {}", summary.output_dir.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the config file and apply command-line overrides.
fn load_config(path: &Path, output: Option<&Path>) -> Result<PipelineConfig, config::ConfigError> {
    let mut config = config::load_config(path)?;
    if let Some(output) = output {
        config.output_dir = output.to_string_lossy().to_string();
    }
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Build a pipeline whose progress events are printed on a separate thread.
fn pipeline_with_printer(config: PipelineConfig) -> (Pipeline, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = spawn_printer(rx);
    (Pipeline::new(config).with_events(tx), printer)
}

fn spawn_printer(rx: Receiver<ProcessEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in rx {
            output::print_process_event(&event);
        }
    })
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::warn!("progress printer thread panicked");
    }
}

/// Append the processing marker unless the reference already carries it.
fn with_marker(reference: &str) -> String {
    if reference.contains(REFERENCE_MARKER) {
        reference.to_string()
    } else {
        format!("{}{}", reference, REFERENCE_MARKER)
    }
}

/// Every supported image under `dir` as a marked reference, sorted by path.
fn collect_references(dir: &Path) -> Result<Vec<String>, walkdir::Error> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_source(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths
        .iter()
        .map(|p| with_marker(&p.to_string_lossy()))
        .collect())
}
