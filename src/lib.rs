use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use url::Url;

pub mod compile;
pub mod dependencies;
pub mod errors;
pub mod import_map;
pub mod mirror;
pub mod output;
pub mod transform;
pub mod utils;

use compile::{CompileOptions, HttpTransformService, LocalCompiler, Transform};
use errors::InputError;
use import_map::ImportMap;
use mirror::{DownloadCoordinator, Fetch, HttpFetcher, MirrorLayout};
use output::EntryHtml;
use utils::file_utils::{self, make_relative_to_cwd};

pub use errors::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://esm.sh";
pub const DEFAULT_OUT_DIR: &str = "dist";

const SOURCE_EXTENSIONS: [&str; 4] = ["ts", "tsx", "jsx", "js"];

/// Resolved settings for one `download_app` run.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub entry: PathBuf,
    pub out_dir: PathBuf,
    pub api_url: String,
    pub deno_json: Option<PathBuf>,
    pub base_path: Option<String>,
    pub minify: bool,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub target: String,
    pub jsx_import_source: String,
}

impl DownloadOptions {
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            api_url: DEFAULT_API_URL.to_string(),
            deno_json: None,
            base_path: None,
            minify: false,
            concurrency: mirror::coordinator::DEFAULT_CONCURRENCY,
            timeout: mirror::fetch::DEFAULT_TIMEOUT,
            max_redirects: mirror::fetch::DEFAULT_MAX_REDIRECTS,
            target: compile::DEFAULT_TARGET.to_string(),
            jsx_import_source: compile::DEFAULT_JSX_IMPORT_SOURCE.to_string(),
        }
    }

    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            target: self.target.clone(),
            jsx_import_source: self.jsx_import_source.clone(),
            minify: self.minify,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub out_dir: PathBuf,
    /// Distinct module URLs fetched from the CDN.
    pub modules_downloaded: usize,
    /// What was written to `importmap.json`.
    pub import_map: ImportMap,
    /// Compiled application files, relative to `out_dir`.
    pub compiled_files: Vec<PathBuf>,
    pub copied_assets: usize,
}

enum Entry {
    /// A project directory and its `index.html`.
    Directory { dir: PathBuf, index_html: PathBuf },
    Html(PathBuf),
    /// A TypeScript/JSX entry compiled on its own.
    Source(PathBuf),
}

impl Entry {
    async fn resolve(options: &DownloadOptions) -> std::result::Result<Self, InputError> {
        let path = &options.entry;
        let metadata = tokio::fs::metadata(path).await.map_err(|source| InputError::EntryNotFound {
            path: path.clone(),
            source,
        })?;

        if metadata.is_dir() {
            let index_html = path.join("index.html");
            let has_index = tokio::fs::metadata(&index_html)
                .await
                .is_ok_and(|index| index.is_file());
            if !has_index {
                return Err(InputError::MissingIndexHtml(path.clone()));
            }
            return Ok(Entry::Directory {
                dir: path.clone(),
                index_html,
            });
        }

        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext));
        if is_source {
            if options.deno_json.is_none() {
                return Err(InputError::SourceEntryNeedsImportMap(path.clone()));
            }
            return Ok(Entry::Source(path.clone()));
        }
        Ok(Entry::Html(path.clone()))
    }

    fn html(&self) -> Option<&Path> {
        match self {
            Entry::Directory { index_html, .. } => Some(index_html),
            Entry::Html(path) => Some(path),
            Entry::Source(_) => None,
        }
    }
}

/// Mirror an app's CDN dependencies into `options.out_dir` and compile its
/// own sources so it runs without the CDN.
pub async fn download_app(options: &DownloadOptions) -> Result<DownloadSummary> {
    let api_url = Url::parse(&options.api_url).map_err(|source| InputError::InvalidApiUrl {
        url: options.api_url.clone(),
        source,
    })?;
    let entry = Entry::resolve(options).await?;

    let import_map = match (&options.deno_json, entry.html()) {
        (Some(deno_json), _) => ImportMap::load_json(deno_json)?,
        (None, Some(html)) => ImportMap::load_html(html)?,
        (None, None) => return Err(InputError::SourceEntryNeedsImportMap(options.entry.clone()).into()),
    }
    .with_implied_submodules();
    if import_map.is_empty() {
        warn!("Import map has no entries; nothing to mirror");
    } else {
        info!("Found {} imports", import_map.len());
    }

    let layout = MirrorLayout::new(&options.out_dir, &api_url, options.base_path.as_deref());
    file_utils::ensure_directory_exists(&layout.mirror_root())?;

    let fetcher: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(options.timeout, options.max_redirects)?);
    let coordinator = DownloadCoordinator::new(fetcher, layout.clone(), options.concurrency);
    info!(
        "Downloading modules into {}",
        make_relative_to_cwd(&layout.mirror_root()).display()
    );
    let modules = coordinator.mirror(&import_map).await?;
    let public_map = output::public_import_map(&modules, &layout);

    let service: Arc<dyn Transform> =
        Arc::new(HttpTransformService::new(&api_url, options.timeout)?);
    let mut summary = DownloadSummary {
        out_dir: options.out_dir.clone(),
        modules_downloaded: coordinator.downloaded_count(),
        import_map: public_map.clone(),
        ..Default::default()
    };

    match &entry {
        Entry::Directory { dir, .. } => {
            summary.copied_assets = file_utils::copy_project_assets(
                dir,
                &options.out_dir,
                &[layout.host_segment(), "esm.sh"],
            )?;
            info!("Copied {} project files", summary.copied_assets);
        }
        Entry::Html(path) => {
            let target = options.out_dir.join(file_name(path)?);
            tokio::fs::copy(path, &target).await?;
            summary.copied_assets = 1;
        }
        Entry::Source(path) => {
            let mut compiler = LocalCompiler::new(
                Arc::clone(&service),
                parent_dir(path),
                &options.out_dir,
                public_map.clone(),
                layout.specifier_prefix(),
                options.compile_options(),
            );
            compiler
                .compile_entry(path, &file_name(path)?.to_string_lossy())
                .await?;
            summary.compiled_files = compiler.compiled_files();
        }
    }

    let import_map_path = output::write_import_map(&options.out_dir, &public_map).await?;
    info!("Wrote {}", make_relative_to_cwd(&import_map_path).display());

    if let Some(html_path) = entry.html() {
        let out_html = options.out_dir.join(file_name(html_path)?);
        let mut html = EntryHtml::new(tokio::fs::read_to_string(&out_html).await?, &api_url)?;
        html.link_import_map(layout.base_path());

        let project_dir = parent_dir(html_path);
        let mut compiler = LocalCompiler::new(
            Arc::clone(&service),
            &project_dir,
            &options.out_dir,
            public_map.clone(),
            layout.specifier_prefix(),
            options.compile_options(),
        );
        let mut compiled = HashMap::new();
        for href in html.compile_targets() {
            let source = project_dir.join(href.trim_start_matches('/'));
            let output = compiler.compile_entry(&source, &href).await?;
            compiled.insert(href, output);
        }
        html.link_compiled_scripts(&compiled, layout.base_path());
        tokio::fs::write(&out_html, html.into_string()).await?;
        summary.compiled_files = compiler.compiled_files();
    }

    info!(
        "Done: {} modules, {} compiled files in {}",
        summary.modules_downloaded,
        summary.compiled_files.len(),
        make_relative_to_cwd(&options.out_dir).display()
    );
    Ok(summary)
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .ok_or_else(|| Error::Custom(format!("Entry has no file name: {:?}", path)))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
