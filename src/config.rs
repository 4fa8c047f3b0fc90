use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use esmirror::DownloadOptions;

/// Optional `esmirror.toml`. Every key has a default; command-line flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub compile: CompileConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_redirects: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    pub target: String,
    pub jsx_import_source: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            concurrency: esmirror::mirror::coordinator::DEFAULT_CONCURRENCY,
            timeout_secs: esmirror::mirror::fetch::DEFAULT_TIMEOUT.as_secs(),
            max_redirects: esmirror::mirror::fetch::DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            target: esmirror::compile::DEFAULT_TARGET.to_string(),
            jsx_import_source: esmirror::compile::DEFAULT_JSX_IMPORT_SOURCE.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Fill in what the command line leaves to the config file.
    pub fn apply(&self, options: &mut DownloadOptions) {
        options.concurrency = self.mirror.concurrency;
        options.timeout = Duration::from_secs(self.mirror.timeout_secs);
        options.max_redirects = self.mirror.max_redirects;
        options.target = self.compile.target.clone();
        options.jsx_import_source = self.compile.jsx_import_source.clone();
    }
}
