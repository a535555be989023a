use clap::{Parser, Subcommand};
use noisepress::config::{self, BuildMode, ProjectPaths, SiteConfig};
use noisepress::imaging::RustBackend;
use noisepress::site::{self, BuildOptions};
use noisepress::{export, output};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Shared flags for commands that process images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the image cache and re-encode every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "noisepress")]
#[command(about = "Post-processing pipeline for a static blog")]
#[command(long_about = "\
Post-processing pipeline for a static blog

Runs after the templating step has rendered markdown posts into HTML. Every
rendered page goes through the same ordered transforms:

  1. carousel     :::carousel fences → slide markup + script
  2. images       <img> → <picture> with WebP/JPEG/AVIF variants
  3. preload      <link rel=\"preload\"> for the first optimized image
  4. asset-links  relative asset links → absolute URLs
  5. details      <details> body wrapper + collapse control

Project layout (defaults, see 'noisepress gen-config'):

  noisepress.toml          # Optional config, layered over stock defaults
  src/
  ├── assets/images/       # Image sources referenced by posts
  ├── assets/code/         # Downloadable snippets (passthrough)
  └── posts/*.md           # Post sources (exported as llms.txt)
  docs/                    # Rendered site, rewritten in place
  └── posts/<slug>/index.html

Typical build:

  noisepress clean         # before templating
  <run the templating step>
  noisepress --mode published build")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (defaults to <root>/noisepress.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Link target mode: local dev server or published repository URLs
    #[arg(long, env = "NOISEPRESS_ENV", default_value = "local", global = true)]
    mode: BuildMode,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Remove generated output, keeping the configured entries
    Clean,
    /// Copy passthrough files and run the page transforms
    Process(CacheArgs),
    /// Write llms.txt next to every rendered post
    Export,
    /// Run the post-build pipeline: process → export
    Build(CacheArgs),
    /// Print a stock noisepress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match &cli.command {
        Command::Clean => {
            let (site_config, paths) = load_site(&cli)?;
            let removed = site::clean_output(&paths.output, &site_config.clean.keep)?;
            output::print_clean_output(&removed, &paths.output);
        }
        Command::Process(cache_args) => {
            let (site_config, paths) = load_site(&cli)?;
            run_process(&cli, &site_config, &paths, cache_args)?;
        }
        Command::Export => {
            let (site_config, paths) = load_site(&cli)?;
            let report = export::export_posts(&paths, &site_config, cli.mode)?;
            output::print_export_output(&report, &paths.output);
        }
        Command::Build(cache_args) => {
            let (site_config, paths) = load_site(&cli)?;

            println!("==> Stage 1: Processing pages in {}", paths.output.display());
            run_process(&cli, &site_config, &paths, cache_args)?;

            println!("==> Stage 2: Exporting posts");
            let report = export::export_posts(&paths, &site_config, cli.mode)?;
            output::print_export_output(&report, &paths.output);

            println!("==> Build complete: {}", paths.output.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config (explicit `--config` or `<root>/noisepress.toml`) and
/// resolve its directories against the root.
fn load_site(cli: &Cli) -> Result<(SiteConfig, ProjectPaths), config::ConfigError> {
    let site_config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.root)?,
    };
    let paths = site_config.resolve_paths(&cli.root);
    Ok((site_config, paths))
}

fn run_process(
    cli: &Cli,
    site_config: &SiteConfig,
    paths: &ProjectPaths,
    cache_args: &CacheArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    init_thread_pool(&site_config.processing);
    info!(mode = %cli.mode, "starting page processing");

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for result in rx {
            for line in output::format_page_result(&result) {
                println!("{}", line);
            }
        }
    });

    let backend = RustBackend::new();
    let result = site::process_site(
        paths,
        site_config,
        &backend,
        BuildOptions {
            mode: cli.mode,
            use_cache: !cache_args.no_cache,
        },
        Some(tx),
    );
    printer.join().ok();

    output::print_build_summary(&result?);
    Ok(())
}

/// Install the stderr log subscriber. `-v` switches from INFO to DEBUG.
fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
