use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use regex::{Captures, NoExpand, Regex};
use url::Url;

use crate::errors::{Error, Result};
use crate::import_map::{IMPORT_MAP_SCRIPT_RE, ImportMap};
use crate::mirror::MirrorLayout;

pub const IMPORT_MAP_FILE: &str = "importmap.json";

/// The module map as the browser sees it: mirror paths get the base path.
pub fn public_import_map(modules: &BTreeMap<String, String>, layout: &MirrorLayout) -> ImportMap {
    ImportMap {
        imports: modules
            .iter()
            .map(|(specifier, path)| (specifier.clone(), layout.public_path(path)))
            .collect(),
    }
}

pub async fn write_import_map(out_dir: &Path, import_map: &ImportMap) -> Result<PathBuf> {
    let path = out_dir.join(IMPORT_MAP_FILE);
    let json = serde_json::to_string_pretty(import_map)
        .map_err(|e| Error::Custom(format!("Failed to serialize import map: {e}")))?;
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| Error::Custom(format!("Failed to write import map: {:?}: {e}", path)))?;
    Ok(path)
}

/// `./file` without a base path, `/base/file` with one.
fn public_src(base_path: &str, file: &str) -> String {
    let file = file.trim_start_matches("./").trim_start_matches('/');
    if base_path.is_empty() {
        format!("./{file}")
    } else {
        format!("{base_path}/{file}")
    }
}

/// An entry HTML page being pointed at the local build.
///
/// Scripts of the form `<script src="<api>/x" href="./src/main.tsx">` ask the
/// CDN to compile `href` in the browser; they are swapped for the file
/// compiled ahead of time.
pub struct EntryHtml {
    html: String,
    compile_tag: Regex,
}

impl EntryHtml {
    pub fn new(html: impl Into<String>, api_url: &Url) -> Result<Self> {
        let api = regex::escape(api_url.as_str().trim_end_matches('/'));
        let compile_tag = Regex::new(&format!(
            r#"<script\s+[^>]*src="{api}/x"[^>]*href="([^"]+)"[^>]*>(?:</script>)?"#
        ))
        .map_err(|e| Error::Custom(format!("Invalid compile script pattern: {e}")))?;
        Ok(Self {
            html: html.into(),
            compile_tag,
        })
    }

    /// `href` of every compile script, in document order, without repeats.
    pub fn compile_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for captures in self.compile_tag.captures_iter(&self.html) {
            let href = &captures[1];
            if !targets.iter().any(|t| t == href) {
                targets.push(href.to_string());
            }
        }
        targets
    }

    /// Replace the inline import map with a reference to `importmap.json`.
    pub fn link_import_map(&mut self, base_path: &str) {
        let tag = format!(
            r#"<script type="importmap" src="{}"></script>"#,
            public_src(base_path, IMPORT_MAP_FILE)
        );
        self.html = IMPORT_MAP_SCRIPT_RE
            .replace_all(&self.html, NoExpand(&tag))
            .into_owned();
    }

    /// Point each compile script at its compiled file. `compiled` maps an
    /// `href` to the output path relative to the output directory; tags
    /// without an entry are left alone.
    pub fn link_compiled_scripts(&mut self, compiled: &HashMap<String, PathBuf>, base_path: &str) {
        self.html = self
            .compile_tag
            .replace_all(&self.html, |captures: &Captures| match compiled.get(&captures[1]) {
                Some(output) => format!(
                    r#"<script type="module" src="{}"></script>"#,
                    public_src(base_path, &output.to_string_lossy().replace('\\', "/"))
                ),
                None => captures[0].to_string(),
            })
            .into_owned();
    }

    pub fn into_string(self) -> String {
        self.html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"<html>
<head>
<script type="importmap">
{"imports": {"react": "https://esm.sh/react@19.0.0"}}
</script>
</head>
<body>
<script type="module" src="https://esm.sh/x" href="./src/main.tsx"></script>
<script src="https://esm.sh/x" href="./src/admin.tsx" type="module"></script>
<script src="https://other.example/x" href="./src/ignored.tsx"></script>
</body>
</html>"#;

    fn api() -> Url {
        Url::parse("https://esm.sh").unwrap()
    }

    fn compiled() -> HashMap<String, PathBuf> {
        HashMap::from([
            ("./src/main.tsx".to_string(), PathBuf::from("src/main.js")),
            ("./src/admin.tsx".to_string(), PathBuf::from("src/admin.js")),
        ])
    }

    #[test]
    fn finds_compile_targets_for_the_configured_cdn() {
        let html = EntryHtml::new(INDEX_HTML, &api()).unwrap();
        assert_eq!(html.compile_targets(), vec!["./src/main.tsx", "./src/admin.tsx"]);
    }

    #[test]
    fn links_each_script_to_its_own_output() {
        let mut html = EntryHtml::new(INDEX_HTML, &api()).unwrap();
        html.link_import_map("");
        html.link_compiled_scripts(&compiled(), "");
        let html = html.into_string();

        assert!(html.contains(r#"<script type="importmap" src="./importmap.json"></script>"#));
        assert!(html.contains(r#"<script type="module" src="./src/main.js"></script>"#));
        assert!(html.contains(r#"<script type="module" src="./src/admin.js"></script>"#));
        assert!(html.contains(r#"href="./src/ignored.tsx""#));
        assert!(!html.contains("react@19.0.0"));
    }

    #[test]
    fn applies_base_path() {
        let mut html = EntryHtml::new(INDEX_HTML, &api()).unwrap();
        html.link_import_map("/app");
        html.link_compiled_scripts(&compiled(), "/app");
        let html = html.into_string();

        assert!(html.contains(r#"<script type="importmap" src="/app/importmap.json"></script>"#));
        assert!(html.contains(r#"<script type="module" src="/app/src/main.js"></script>"#));
    }

    #[tokio::test]
    async fn writes_public_import_map() {
        let out = tempfile::tempdir().unwrap();
        let layout = MirrorLayout::new(out.path(), &Url::parse("https://cdn.example").unwrap(), Some("app"));
        let modules = BTreeMap::from([
            ("react".to_string(), "/cdn.example/react@19.0.0/index.js".to_string()),
            ("@/".to_string(), "./src/".to_string()),
        ]);

        let path = write_import_map(out.path(), &public_import_map(&modules, &layout))
            .await
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({"imports": {
                "react": "/app/cdn.example/react@19.0.0/index.js",
                "@/": "./src/"
            }})
        );
    }
}
