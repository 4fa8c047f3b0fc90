use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Custom error: {0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Problems with what the user handed us. Raised before any network activity.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Entry not found: {path:?}: {source}")]
    EntryNotFound {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No index.html found in directory {0:?}")]
    MissingIndexHtml(PathBuf),
    #[error("Entry {0:?} is an application source file; pass --deno-json to supply its import map")]
    SourceEntryNeedsImportMap(PathBuf),
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No <script type=\"importmap\"> found in {0:?}")]
    NoImportMap(PathBuf),
    #[error("Malformed import map in {path:?}: {source}")]
    MalformedImportMap {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Import map in {0:?} has no \"imports\" object")]
    MissingImports(PathBuf),
    #[error("Invalid API URL '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("redirect from {url} (HTTP {status}) has no usable Location header")]
    MissingLocation { url: String, status: u16 },
    #[error("redirect from {url} points to invalid location '{location}'")]
    InvalidLocation { url: String, location: String },
    #[error("more than {limit} redirects starting at {url}")]
    TooManyRedirects { url: String, limit: usize },
}

/// Why a single download task failed. Never aborts sibling tasks.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid module URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("download task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug)]
pub struct DownloadFailure {
    pub url: String,
    pub error: DownloadError,
}

/// Aggregate of every failed download in one mirror run.
#[derive(Debug, Error)]
#[error("{}", format_failures(.failures))]
pub struct MirrorError {
    pub failures: Vec<DownloadFailure>,
}

impl MirrorError {
    pub fn failed_urls(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.url.as_str())
    }
}

fn format_failures(failures: &[DownloadFailure]) -> String {
    let mut message = format!("{} module download(s) failed:", failures.len());
    for failure in failures {
        message.push_str(&format!("\n  {}: {}", failure.url, failure.error));
    }
    message
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Source file not found: {0:?}")]
    SourceNotFound(PathBuf),
    #[error("Failed to read source file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unsupported file type '{extension}' for {path:?}")]
    UnsupportedFileType { path: PathBuf, extension: String },
    #[error("Failed to encode transform request for {filename}: {source}")]
    Encode {
        filename: String,
        source: serde_json::Error,
    },
    #[error("Transform request for {filename} failed: {source}")]
    Request {
        filename: String,
        source: reqwest::Error,
    },
    #[error("Transform service returned HTTP {status} for {filename}: {body}")]
    Service {
        filename: String,
        status: u16,
        body: String,
    },
    #[error("Malformed transform response for {filename}: {source}")]
    MalformedResponse {
        filename: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Graph(#[from] crate::compile::graph::SourceGraphError),
}

#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("Failed to parse JavaScript: {message}")]
    JsParse { message: String },
    #[error("JavaScript parsing panicked")]
    JsPanicParse,
}

pub type DependencyResult<T> = std::result::Result<T, DependencyError>;
