use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

pub mod graph;
pub mod service;

pub use graph::{SourceGraph, SourceKind, SourceNode};
pub use service::{HttpTransformService, Lang, Transform, TransformOutput, TransformRequest};

use crate::dependencies::local::local_imports;
use crate::errors::CompileError;
use crate::import_map::ImportMap;
use crate::transform::{patch_local_extensions, rewrite_specifiers};
use crate::utils::file_utils::{make_relative_to_cwd, normalize_path};

pub const DEFAULT_TARGET: &str = "es2022";
pub const DEFAULT_JSX_IMPORT_SOURCE: &str = "react";

const ASSET_EXTENSIONS: [&str; 3] = ["css", "svg", "json"];
const PROBE_EXTENSIONS: [&str; 4] = ["tsx", "ts", "jsx", "js"];

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub target: String,
    pub jsx_import_source: String,
    pub minify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            jsx_import_source: DEFAULT_JSX_IMPORT_SOURCE.to_string(),
            minify: false,
        }
    }
}

/// Compiles an application's own TypeScript/JSX sources, following relative
/// imports breadth-first. Each file is handled once; the first failure aborts.
pub struct LocalCompiler {
    service: Arc<dyn Transform>,
    project_dir: PathBuf,
    out_dir: PathBuf,
    import_map: ImportMap,
    specifier_prefix: String,
    options: CompileOptions,
    graph: SourceGraph,
}

/// What processing one file produced: its local imports as
/// `(project path, specifier)`.
type Discovered = Vec<(PathBuf, String)>;

impl LocalCompiler {
    /// `import_map` is handed to the service for bare specifiers; its values
    /// should already point at the mirror. `specifier_prefix` is the mirror's
    /// `[base_path]/<host>`.
    pub fn new(
        service: Arc<dyn Transform>,
        project_dir: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        import_map: ImportMap,
        specifier_prefix: impl Into<String>,
        options: CompileOptions,
    ) -> Self {
        Self {
            service,
            project_dir: project_dir.into(),
            out_dir: out_dir.into(),
            import_map,
            specifier_prefix: specifier_prefix.into(),
            options,
            graph: SourceGraph::new(),
        }
    }

    /// Output paths (relative to the output directory) of every compiled script.
    pub fn compiled_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self
            .graph
            .all_files()
            .filter(|node| matches!(node.kind, SourceKind::Script(_)))
            .map(SourceNode::output_path)
            .collect();
        files.sort();
        files
    }

    /// Compile `relative_path` (read from `source_path`) and everything it
    /// imports locally. Returns the entry's output path relative to the
    /// output directory.
    pub async fn compile_entry(
        &mut self,
        source_path: &Path,
        relative_path: &str,
    ) -> Result<PathBuf, CompileError> {
        let entry = project_key(relative_path)
            .ok_or_else(|| CompileError::SourceNotFound(source_path.to_path_buf()))?;
        if let Some(node) = self.graph.get_file(&entry) {
            debug!("{} already compiled", entry.display());
            return Ok(node.output_path());
        }
        if !source_path.is_file() {
            return Err(CompileError::SourceNotFound(source_path.to_path_buf()));
        }

        info!("Compiling {}", make_relative_to_cwd(source_path).display());
        self.register(entry.clone(), source_path.to_path_buf())?;
        let mut queue = VecDeque::from([entry.clone()]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.graph.get_file(&current).cloned() else {
                continue;
            };
            for (child, specifier) in self.process(&node).await? {
                if !self.graph.contains_file(&child) {
                    let source = self
                        .locate(&child)
                        .ok_or_else(|| CompileError::SourceNotFound(self.project_dir.join(&child)))?;
                    self.register(child.clone(), source)?;
                    queue.push_back(child.clone());
                }
                self.graph.add_dependency(&current, &child, &specifier)?;
            }
        }

        self.graph.debug_print_summary();
        Ok(entry.with_extension("js"))
    }

    fn register(&mut self, path: PathBuf, source: PathBuf) -> Result<(), CompileError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        let kind = if ASSET_EXTENSIONS.contains(&extension.as_str()) {
            SourceKind::Asset
        } else if let Some(lang) = Lang::from_extension(&extension) {
            SourceKind::Script(lang)
        } else {
            return Err(CompileError::UnsupportedFileType {
                path: source,
                extension,
            });
        };
        self.graph.add_file(SourceNode { path, source, kind });
        Ok(())
    }

    async fn process(&self, node: &SourceNode) -> Result<Discovered, CompileError> {
        let output = self.out_dir.join(node.output_path());
        ensure_parent(&output).await?;

        let lang = match node.kind {
            SourceKind::Asset => {
                debug!("Copying asset {}", node.path.display());
                tokio::fs::copy(&node.source, &output)
                    .await
                    .map_err(|source| CompileError::Write {
                        path: output.clone(),
                        source,
                    })?;
                return Ok(Vec::new());
            }
            SourceKind::Script(lang) => lang,
        };

        let source_text = tokio::fs::read_to_string(&node.source)
            .await
            .map_err(|source| CompileError::Read {
                path: node.source.clone(),
                source,
            })?;

        let mut discovered = Vec::new();
        let mut probed = HashSet::new();
        for specifier in local_imports(&source_text, &node.source) {
            match self.resolve_import(&node.path, &specifier) {
                Some((path, was_probed)) => {
                    if was_probed {
                        probed.insert(specifier.clone());
                    }
                    discovered.push((path, specifier));
                }
                None => warn!(
                    "Ignoring import '{}' in {}: it leaves the project directory",
                    specifier,
                    node.path.display()
                ),
            }
        }

        let request = TransformRequest {
            code: source_text,
            filename: slash_path(&node.path),
            lang,
            target: self.options.target.clone(),
            import_map: self.import_map.clone(),
            jsx_import_source: lang
                .is_jsx()
                .then(|| self.options.jsx_import_source.clone()),
            minify: self.options.minify,
        };
        let compiled = self.service.transform(request).await?;

        let code = rewrite_specifiers(
            &patch_local_extensions(&compiled.code, &probed),
            &self.specifier_prefix,
        );
        write(&output, code.as_bytes()).await?;
        if let Some(map) = compiled.map.filter(|map| !map.is_empty()) {
            let mut map_path = output.clone().into_os_string();
            map_path.push(".map");
            write(Path::new(&map_path), map.as_bytes()).await?;
        }
        debug!(
            "Compiled {} -> {}",
            node.path.display(),
            make_relative_to_cwd(&output).display()
        );

        Ok(discovered)
    }

    /// Project path of `specifier` imported from `from`, and whether the
    /// extension had to be guessed. `None` when it climbs out of the project.
    fn resolve_import(&self, from: &Path, specifier: &str) -> Option<(PathBuf, bool)> {
        let dir = from.parent().unwrap_or(Path::new(""));
        let path = normalize_path(&dir.join(specifier));
        if path.starts_with("..") || path.as_os_str().is_empty() {
            return None;
        }
        if path.extension().is_none() {
            for ext in PROBE_EXTENSIONS {
                let candidate = path.with_extension(ext);
                if self.locate(&candidate).is_some() {
                    return Some((candidate, true));
                }
            }
        }
        Some((path, false))
    }

    /// A project file on disk: under the project directory, else one level up.
    fn locate(&self, path: &Path) -> Option<PathBuf> {
        let direct = self.project_dir.join(path);
        if direct.is_file() {
            return Some(direct);
        }
        let fallback = self.project_dir.parent()?.join(path);
        fallback.is_file().then_some(fallback)
    }
}

/// `./src/main.tsx`, `/src/main.tsx` and `src/main.tsx` all name `src/main.tsx`.
fn project_key(relative_path: &str) -> Option<PathBuf> {
    let path = normalize_path(Path::new(relative_path.trim_start_matches('/')));
    if path.starts_with("..") || path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

async fn ensure_parent(path: &Path) -> Result<(), CompileError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| CompileError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

async fn write(path: &Path, contents: &[u8]) -> Result<(), CompileError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| CompileError::Write {
            path: path.to_path_buf(),
            source,
        })
}
