use std::path::{Path, PathBuf};

use url::Url;

use super::normalize::strip_query;

/// Where mirrored modules live on disk and under which URL path they are served.
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    out_dir: PathBuf,
    host_segment: String,
    base_path: String,
}

impl MirrorLayout {
    /// `api_url` is the CDN origin; its authority becomes the mirror's top-level
    /// directory (`https://esm.sh` -> `<out_dir>/esm.sh`).
    pub fn new(out_dir: impl Into<PathBuf>, api_url: &Url, base_path: Option<&str>) -> Self {
        let host_segment = match (api_url.host_str(), api_url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => "cdn".to_string(),
        };
        Self {
            out_dir: out_dir.into(),
            host_segment,
            base_path: base_path.map(normalize_base_path).unwrap_or_default(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn host_segment(&self) -> &str {
        &self.host_segment
    }

    /// Normalized base path: empty, or `/segment[/segment..]` without a trailing slash.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn mirror_root(&self) -> PathBuf {
        self.out_dir.join(&self.host_segment)
    }

    /// Prefix every rewritten specifier starts with: `[base_path]/<host>`.
    pub fn specifier_prefix(&self) -> String {
        format!("{}/{}", self.base_path, self.host_segment)
    }

    /// Path of a module under the output directory's URL root, `/<host><normalized>`.
    pub fn mirror_path(&self, normalized: &str) -> String {
        format!("/{}{}", self.host_segment, strip_query(normalized))
    }

    /// `mirror_path`-style value as the browser requests it, base path included.
    pub fn public_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_path, path)
        } else {
            path.to_string()
        }
    }

    /// Filesystem location of a normalized module path. The query never reaches disk.
    pub fn local_file(&self, normalized: &str) -> PathBuf {
        let relative = strip_query(normalized).trim_start_matches('/');
        let mut file = self.mirror_root();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            file.push(segment);
        }
        file
    }

    /// Module path (path plus query) of a remote URL, with scheme and host dropped.
    pub fn module_path(url: &Url) -> String {
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }
}

pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
