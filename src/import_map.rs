use std::collections::BTreeMap;
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::InputError;

lazy_static! {
    pub(crate) static ref IMPORT_MAP_SCRIPT_RE: Regex =
        Regex::new(r#"<script\s+type="importmap"\s*>([\s\S]*?)</script>"#).unwrap();
}

/// Sub-modules a React app almost always needs but rarely lists.
const IMPLIED_SUBMODULES: [(&str, &str); 2] = [("react", "jsx-runtime"), ("react-dom", "client")];

/// `{"imports": {specifier: url}}`. Ordered so output files are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ImportMapDocument {
    imports: Option<BTreeMap<String, String>>,
}

impl ImportMap {
    /// Parse a JSON document carrying an `imports` object (an inline import
    /// map or a `deno.json`). Other keys are ignored.
    pub fn from_json(text: &str, origin: &Path) -> Result<Self, InputError> {
        let document: ImportMapDocument =
            serde_json::from_str(text).map_err(|source| InputError::MalformedImportMap {
                path: origin.to_path_buf(),
                source,
            })?;
        let imports = document
            .imports
            .ok_or_else(|| InputError::MissingImports(origin.to_path_buf()))?;
        Ok(Self { imports })
    }

    /// First `<script type="importmap">` block of an HTML document.
    pub fn from_html(html: &str, origin: &Path) -> Result<Self, InputError> {
        let captures = IMPORT_MAP_SCRIPT_RE
            .captures(html)
            .ok_or_else(|| InputError::NoImportMap(origin.to_path_buf()))?;
        Self::from_json(&captures[1], origin)
    }

    pub fn load_html(path: &Path) -> Result<Self, InputError> {
        Self::from_html(&read(path)?, path)
    }

    pub fn load_json(path: &Path) -> Result<Self, InputError> {
        Self::from_json(&read(path)?, path)
    }

    /// Add `react/jsx-runtime` and `react-dom/client` when their base package
    /// is mapped and they are not.
    pub fn with_implied_submodules(mut self) -> Self {
        for (base, sub) in IMPLIED_SUBMODULES {
            let name = format!("{base}/{sub}");
            if self.imports.contains_key(&name) {
                continue;
            }
            let Some(url) = self.imports.get(base).map(|url| submodule_url(url, base, sub)) else {
                continue;
            };
            debug!("Adding implied import {name} -> {url}");
            self.imports.insert(name, url);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

fn read(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// `https://esm.sh/react@19.0.0?dev` -> `https://esm.sh/react@19.0.0/jsx-runtime?dev`.
/// Without a recognisable version the package name itself gets the suffix.
fn submodule_url(base_url: &str, base: &str, sub: &str) -> String {
    let versioned = Regex::new(&format!(r"/{}@([\d.]+)", regex::escape(base)));
    if let Some(found) = versioned.ok().and_then(|re| re.find(base_url)) {
        return format!(
            "{}/{}{}",
            &base_url[..found.end()],
            sub,
            &base_url[found.end()..]
        );
    }
    base_url.replacen(base, &format!("{base}/{sub}"), 1)
}
