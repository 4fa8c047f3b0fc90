use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::{Directed, Graph};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;

use super::service::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Sent through the transform service.
    Script(Lang),
    /// `.css`, `.svg`, `.json`: copied as they are.
    Asset,
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    /// Project-relative path, `/`-separated.
    pub path: PathBuf,
    /// Where the file was read from.
    pub source: PathBuf,
    pub kind: SourceKind,
}

#[derive(Debug, Clone)]
pub struct ImportEdge {
    pub specifier: String,
}

/// Application files reached from the compile entries. A path appears at most
/// once, so the index map is also the visited set of the traversal.
#[derive(Default)]
pub struct SourceGraph {
    graph: Graph<SourceNode, ImportEdge, Directed>,
    path_to_index: HashMap<PathBuf, NodeIndex>,
}

impl SourceNode {
    /// File written for this node, relative to the output directory.
    pub fn output_path(&self) -> PathBuf {
        match self.kind {
            SourceKind::Script(_) => self.path.with_extension("js"),
            SourceKind::Asset => self.path.clone(),
        }
    }
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. An existing node with the same path is kept as is.
    pub fn add_file(&mut self, node: SourceNode) -> NodeIndex {
        if let Some(&existing_index) = self.path_to_index.get(&node.path) {
            return existing_index;
        }
        let path = node.path.clone();
        let index = self.graph.add_node(node);
        self.path_to_index.insert(path, index);
        index
    }

    /// Both files must already be in the graph.
    pub fn add_dependency(
        &mut self,
        from_file: &Path,
        to_file: &Path,
        specifier: &str,
    ) -> Result<EdgeIndex, SourceGraphError> {
        let from_idx = self
            .path_to_index
            .get(from_file)
            .ok_or_else(|| SourceGraphError::SourceFileNotFound(from_file.to_path_buf()))?;
        let to_idx = self
            .path_to_index
            .get(to_file)
            .ok_or_else(|| SourceGraphError::TargetFileNotFound(to_file.to_path_buf()))?;

        let edge = ImportEdge {
            specifier: specifier.to_string(),
        };
        Ok(self.graph.add_edge(*from_idx, *to_idx, edge))
    }

    pub fn get_file(&self, file_path: &Path) -> Option<&SourceNode> {
        self.path_to_index
            .get(file_path)
            .map(|&idx| &self.graph[idx])
    }

    pub fn contains_file(&self, file_path: &Path) -> bool {
        self.path_to_index.contains_key(file_path)
    }

    pub fn all_files(&self) -> impl Iterator<Item = &SourceNode> {
        self.graph.node_weights()
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    pub fn debug_print_summary(&self) {
        let scripts = self
            .all_files()
            .filter(|file| matches!(file.kind, SourceKind::Script(_)))
            .count();
        debug!(
            "Source graph: {} files ({} scripts, {} assets), {} imports{}",
            self.file_count(),
            scripts,
            self.file_count() - scripts,
            self.dependency_count(),
            if self.has_cycles() { ", circular imports present" } else { "" }
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceGraphError {
    #[error("Cannot add dependency: source file {0:?} not found")]
    SourceFileNotFound(PathBuf),
    #[error("Cannot add dependency: target file {0:?} not found")]
    TargetFileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, kind: SourceKind) -> SourceNode {
        SourceNode {
            path: PathBuf::from(path),
            source: PathBuf::from("/project").join(path),
            kind,
        }
    }

    #[test]
    fn keeps_first_node_for_a_path() {
        let mut graph = SourceGraph::new();
        let first = graph.add_file(node("src/main.tsx", SourceKind::Script(Lang::Tsx)));
        let second = graph.add_file(node("src/main.tsx", SourceKind::Asset));
        assert_eq!(first, second);
        assert_eq!(graph.file_count(), 1);
        assert_eq!(
            graph.get_file(Path::new("src/main.tsx")).unwrap().kind,
            SourceKind::Script(Lang::Tsx)
        );
    }

    #[test]
    fn records_imports_and_cycles() {
        let mut graph = SourceGraph::new();
        graph.add_file(node("src/a.ts", SourceKind::Script(Lang::Ts)));
        graph.add_file(node("src/b.ts", SourceKind::Script(Lang::Ts)));
        graph.add_file(node("src/a.css", SourceKind::Asset));
        graph
            .add_dependency(Path::new("src/a.ts"), Path::new("src/b.ts"), "./b.ts")
            .unwrap();
        graph
            .add_dependency(Path::new("src/a.ts"), Path::new("src/a.css"), "./a.css")
            .unwrap();
        assert!(!graph.has_cycles());
        graph
            .add_dependency(Path::new("src/b.ts"), Path::new("src/a.ts"), "./a.ts")
            .unwrap();
        assert!(graph.has_cycles());
        assert_eq!(graph.dependency_count(), 3);

        assert!(matches!(
            graph.add_dependency(Path::new("src/a.ts"), Path::new("missing.ts"), "./missing"),
            Err(SourceGraphError::TargetFileNotFound(_))
        ));
    }

    #[test]
    fn output_paths() {
        assert_eq!(
            node("src/App.tsx", SourceKind::Script(Lang::Tsx)).output_path(),
            PathBuf::from("src/App.js")
        );
        assert_eq!(
            node("src/logo.svg", SourceKind::Asset).output_path(),
            PathBuf::from("src/logo.svg")
        );
    }
}
