mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use config::Config;
use esmirror::{DEFAULT_API_URL, DEFAULT_OUT_DIR, DownloadOptions, download_app};

/// Mirror an app's CDN modules locally and precompile its TypeScript/JSX
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Project directory (with index.html), HTML file, or .ts/.tsx/.jsx/.js entry
    entry: PathBuf,

    /// Path to the output directory
    #[arg(long, default_value = DEFAULT_OUT_DIR)]
    out_dir: PathBuf,

    /// Ask the transform service to minify compiled files
    #[arg(long)]
    minify: bool,

    /// CDN origin modules are fetched from; also hosts the transform service
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Read the import map from this deno.json instead of the entry HTML
    #[arg(long)]
    deno_json: Option<PathBuf>,

    /// URL path the output is served under, e.g. /app
    #[arg(long)]
    base_path: Option<String>,

    /// Maximum number of modules downloaded at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Path to an optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default log filter; RUST_LOG overrides it
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn download_options(&self, config: &Config) -> DownloadOptions {
        let mut options = DownloadOptions::new(&self.entry);
        config.apply(&mut options);
        options.out_dir = self.out_dir.clone();
        options.api_url = self.api_url.clone();
        options.deno_json = self.deno_json.clone();
        options.base_path = self.base_path.clone();
        options.minify = self.minify;
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency;
        }
        options
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let options = args.download_options(&config);

    let summary = download_app(&options)
        .await
        .with_context(|| format!("Failed to download {:?}", args.entry))?;

    info!(
        "{} modules mirrored, import map: {}",
        summary.modules_downloaded,
        summary.out_dir.join(esmirror::output::IMPORT_MAP_FILE).display()
    );
    Ok(())
}
