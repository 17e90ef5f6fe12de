//! latex2image CLI
//!
//! Entry point for the `latex2image` command-line tool.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use latex2image::{
    normalize, normalize_and_fingerprint, render_batch, split_snippets, BatchSummary,
    ConfigOverrides, FailureRecord, Fingerprint, PictureKind, ProgressReporter, RenderConfig,
    RenderOutcome, RenderRequest, RenderResult, Reporter, TracingReporter,
};
use latex2image::batch::DEFAULT_SEPARATOR;
use latex2image::toolchain::RasterizerKind;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "latex2image")]
#[command(about = "Render LaTeX snippets to cached PNG images", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized form of a snippet
    Normalize {
        /// Picture kind (equation, pspicture, tikzpicture)
        #[arg(long, short = 'k', default_value = "equation")]
        kind: PictureKind,

        /// Snippet file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Print the cache fingerprint of a snippet
    Fingerprint {
        #[arg(long, short = 'k', default_value = "equation")]
        kind: PictureKind,

        file: Option<PathBuf>,
    },

    /// Render one snippet, printing the cached image path
    Render {
        #[arg(long, short = 'k', default_value = "equation")]
        kind: PictureKind,

        file: Option<PathBuf>,

        /// Where the snippet came from, included in failure reports
        #[arg(long)]
        context: Option<String>,

        #[command(flatten)]
        options: RenderArgs,
    },

    /// Render many snippets from one file in parallel
    Batch {
        #[arg(long, short = 'k', default_value = "equation")]
        kind: PictureKind,

        file: Option<PathBuf>,

        /// Line separating snippets
        #[arg(long, default_value = DEFAULT_SEPARATOR)]
        separator: String,

        /// Worker threads (default: from config, else available parallelism)
        #[arg(long, short = 'j')]
        workers: Option<usize>,

        #[command(flatten)]
        options: RenderArgs,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Config file (default: ./latex2image.toml if present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Cache root directory
    #[arg(long)]
    cache_root: Option<PathBuf>,

    /// Rasterization resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// TeX compiler to run instead of searching LATEX_PATH/PATH
    #[arg(long)]
    compiler: Option<PathBuf>,

    /// Compiler timeout in seconds (0 disables)
    #[arg(long)]
    timeout: Option<u64>,

    /// PDF to PNG converter (imagemagick, pdftoppm)
    #[arg(long, value_parser = parse_rasterizer)]
    rasterizer: Option<RasterizerKind>,

    /// Directory of <kind>.tex template overrides
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    json: bool,
}

impl RenderArgs {
    fn overrides(&self, workers: Option<usize>) -> ConfigOverrides {
        ConfigOverrides {
            cache_root: self.cache_root.clone(),
            dpi: self.dpi,
            compiler: self.compiler.clone(),
            compiler_timeout_seconds: self.timeout,
            rasterizer: self.rasterizer,
            workers,
            templates_dir: self.templates_dir.clone(),
        }
    }
}

fn parse_rasterizer(value: &str) -> Result<RasterizerKind, String> {
    match value {
        "imagemagick" | "convert" => Ok(RasterizerKind::Imagemagick),
        "pdftoppm" => Ok(RasterizerKind::Pdftoppm),
        other => Err(format!("unknown rasterizer: {other}")),
    }
}

/// One rendered snippet in JSON output.
#[derive(Serialize)]
struct RenderReport {
    kind: PictureKind,
    fingerprint: Fingerprint,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    /// Image URL under `image_base_url`
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RenderReport {
    fn new(
        config: &RenderConfig,
        request: &RenderRequest,
        result: &RenderResult<RenderOutcome>,
    ) -> Self {
        let mut report = Self {
            kind: request.kind,
            fingerprint: request.fingerprint.clone(),
            status: "error",
            path: None,
            src: None,
            failure: None,
            error: None,
        };
        match result {
            Ok(RenderOutcome::Cached(path)) => {
                report.status = "cached";
                report.path = Some(path.clone());
                report.src = Some(config.image_src(&request.fingerprint));
            }
            Ok(RenderOutcome::Rendered(path)) => {
                report.status = "rendered";
                report.path = Some(path.clone());
                report.src = Some(config.image_src(&request.fingerprint));
            }
            Ok(RenderOutcome::Failed(record)) => {
                report.status = "failed";
                report.failure = Some(record.clone());
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }
}

#[derive(Serialize)]
struct BatchReport {
    summary: BatchSummary,
    results: Vec<RenderReport>,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { kind, file } => run_normalize(kind, file),
        Commands::Fingerprint { kind, file } => run_fingerprint(kind, file),
        Commands::Render {
            kind,
            file,
            context,
            options,
        } => run_render(kind, file, context, options),
        Commands::Batch {
            kind,
            file,
            separator,
            workers,
            options,
        } => run_batch(kind, file, &separator, workers, options),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(file: Option<&Path>) -> String {
    let result = match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).map(|_| text)
        }
    };
    match result {
        Ok(text) => text,
        Err(e) => {
            let name = file.map_or("stdin".to_string(), |p| p.display().to_string());
            eprintln!("Error reading {}: {}", name, e);
            process::exit(1);
        }
    }
}

fn load_config(options: &RenderArgs, workers: Option<usize>) -> RenderConfig {
    let cwd = PathBuf::from(".");
    let mut config = match RenderConfig::discover(options.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = config.apply(&options.overrides(workers)) {
        eprintln!("Error in options: {}", e);
        process::exit(1);
    }
    config
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_normalize(kind: PictureKind, file: Option<PathBuf>) {
    let raw = read_input(file.as_deref());
    match normalize(kind, &raw) {
        Ok(source) => println!("{}", source),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_fingerprint(kind: PictureKind, file: Option<PathBuf>) {
    let raw = read_input(file.as_deref());
    match normalize_and_fingerprint(kind, &raw) {
        Ok((_, fp)) => println!("{}", fp),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_render(kind: PictureKind, file: Option<PathBuf>, context: Option<String>, options: RenderArgs) {
    let raw = read_input(file.as_deref());
    let config = load_config(&options, None);

    let mut request = match RenderRequest::from_raw(kind, &raw) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Some(context) = context.or_else(|| file.map(|p| p.display().to_string())) {
        request = request.with_context(context);
    }

    let cache = match config.build_cache(Arc::new(TracingReporter)) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = cache.render(&request);
    if options.json {
        print_json(&RenderReport::new(&config, &request, &result));
    } else {
        match &result {
            Ok(outcome) => {
                if let Some(path) = outcome.path() {
                    println!("{}", path.display());
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if !matches!(result, Ok(RenderOutcome::Cached(_) | RenderOutcome::Rendered(_))) {
        process::exit(1);
    }
}

fn run_batch(
    kind: PictureKind,
    file: Option<PathBuf>,
    separator: &str,
    workers: Option<usize>,
    options: RenderArgs,
) {
    let input = read_input(file.as_deref());
    let config = load_config(&options, workers);
    let origin = file.map_or("stdin".to_string(), |p| p.display().to_string());

    let mut requests = Vec::new();
    let mut invalid = 0;
    for (index, snippet) in split_snippets(&input, separator).into_iter().enumerate() {
        match RenderRequest::from_raw(kind, snippet) {
            Ok(request) => requests.push(request.with_context(format!("{origin}#{}", index + 1))),
            Err(e) => {
                tracing::warn!(snippet = index + 1, "skipping snippet: {e}");
                invalid += 1;
            }
        }
    }

    let reporter: Arc<dyn Reporter> = if options.json {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ProgressReporter::new(io::stderr()))
    };
    let cache = match config.build_cache(reporter) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let results = render_batch(&cache, &requests, config.workers);
    let mut summary = BatchSummary::from_results(&results);
    summary.errors += invalid;

    if options.json {
        let results = requests
            .iter()
            .zip(&results)
            .map(|(request, result)| RenderReport::new(&config, request, result))
            .collect();
        print_json(&BatchReport { summary, results });
    } else {
        eprintln!();
        println!(
            "{} rendered, {} cached, {} failed, {} errors",
            summary.rendered, summary.cached, summary.failed, summary.errors
        );
    }

    if !summary.all_succeeded() {
        process::exit(1);
    }
}
