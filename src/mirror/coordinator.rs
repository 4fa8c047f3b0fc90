use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinSet};
use url::Url;

use crate::dependencies::module::module_dependencies;
use crate::errors::{DownloadError, DownloadFailure, MirrorError};
use crate::import_map::ImportMap;
use crate::transform::rewrite_specifiers;
use crate::utils::file_utils::make_relative_to_cwd;

use super::fetch::Fetch;
use super::layout::MirrorLayout;
use super::normalize::{normalize_module_path, strip_query};

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Shared by every download task of one run.
#[derive(Debug, Default)]
struct MirrorState {
    /// Dedup keys of every URL ever dispatched.
    downloaded: Mutex<HashSet<String>>,
    /// Import-map specifier -> mirror path.
    modules: Mutex<BTreeMap<String, String>>,
}

/// One module to fetch. Root tasks carry the import-map specifiers that
/// point at the URL; tasks found through dependency discovery carry none.
#[derive(Debug)]
struct DownloadTask {
    specifiers: Vec<String>,
    url: Url,
}

type TaskOutcome = Result<Vec<Url>, DownloadError>;

/// Recursively mirrors an import map's modules into a `MirrorLayout`.
///
/// Every URL is claimed in the dedup set before its task is spawned, and only
/// the coordinator spawns, so a URL is fetched at most once however many
/// modules import it. Tasks return the dependencies they discovered instead of
/// spawning them, which keeps the join set complete at every `join_next`.
/// At most `concurrency` tasks hold a fetch/write slot at the same time.
pub struct DownloadCoordinator {
    fetcher: Arc<dyn Fetch>,
    layout: Arc<MirrorLayout>,
    gate: Arc<Semaphore>,
    state: Arc<MirrorState>,
}

impl DownloadCoordinator {
    pub fn new(fetcher: Arc<dyn Fetch>, layout: MirrorLayout, concurrency: usize) -> Self {
        Self {
            fetcher,
            layout: Arc::new(layout),
            gate: Arc::new(Semaphore::new(concurrency.max(1))),
            state: Arc::new(MirrorState::default()),
        }
    }

    /// Snapshot of the specifier -> mirror path map built so far.
    pub fn module_map(&self) -> BTreeMap<String, String> {
        self.state.modules.lock().clone()
    }

    pub fn downloaded_count(&self) -> usize {
        self.state.downloaded.lock().len()
    }

    /// Download every module reachable from `import_map` and return the module
    /// map. Failures never stop other tasks; they are reported together once
    /// everything has settled.
    pub async fn mirror(
        &self,
        import_map: &ImportMap,
    ) -> Result<BTreeMap<String, String>, MirrorError> {
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        // URL of every task still in the set, so a panicked task is reported by name
        let mut in_flight: HashMap<TaskId, String> = HashMap::new();
        let mut failures = Vec::new();

        for task in self.root_tasks(import_map) {
            if self.claim(&task.url) {
                self.spawn(&mut tasks, &mut in_flight, task);
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(children))) => {
                    in_flight.remove(&id);
                    for url in children {
                        if self.claim(&url) {
                            self.spawn(
                                &mut tasks,
                                &mut in_flight,
                                DownloadTask {
                                    specifiers: Vec::new(),
                                    url,
                                },
                            );
                        } else {
                            debug!("Already downloaded, skipping {url}");
                        }
                    }
                }
                Ok((id, Err(error))) => {
                    let url = in_flight.remove(&id).unwrap_or_default();
                    error!("Failed to download {url}: {error}");
                    failures.push(DownloadFailure { url, error });
                }
                Err(join_error) => {
                    let url = in_flight.remove(&join_error.id()).unwrap_or_default();
                    error!("Download task for {url} did not finish: {join_error}");
                    failures.push(DownloadFailure {
                        url,
                        error: DownloadError::Aborted(join_error.to_string()),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(self.module_map())
        } else {
            failures.sort_by(|a, b| a.url.cmp(&b.url));
            Err(MirrorError { failures })
        }
    }

    /// Group import-map entries by URL so aliases share one download. Entries
    /// that are not remote URLs are kept in the module map unchanged.
    fn root_tasks(&self, import_map: &ImportMap) -> Vec<DownloadTask> {
        let mut by_key: BTreeMap<String, DownloadTask> = BTreeMap::new();
        for (specifier, target) in &import_map.imports {
            match Url::parse(target) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    by_key
                        .entry(dedup_key(&url))
                        .or_insert_with(|| DownloadTask {
                            specifiers: Vec::new(),
                            url,
                        })
                        .specifiers
                        .push(specifier.clone());
                }
                _ => {
                    warn!("Import '{specifier}' -> '{target}' is not a remote URL; keeping it as is");
                    self.state
                        .modules
                        .lock()
                        .insert(specifier.clone(), target.clone());
                }
            }
        }
        by_key.into_values().collect()
    }

    /// Insert the URL into the dedup set. `false` when it was already there.
    fn claim(&self, url: &Url) -> bool {
        self.state.downloaded.lock().insert(dedup_key(url))
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<TaskOutcome>,
        in_flight: &mut HashMap<TaskId, String>,
        task: DownloadTask,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let layout = Arc::clone(&self.layout);
        let gate = Arc::clone(&self.gate);
        let state = Arc::clone(&self.state);
        let url = task.url.to_string();
        let handle =
            tasks.spawn(async move { download_module(fetcher, layout, gate, state, task).await });
        in_flight.insert(handle.id(), url);
    }
}

/// The query does not reach the file name, so it does not make a module distinct.
fn dedup_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_query(None);
    key.set_fragment(None);
    key.to_string()
}

async fn download_module(
    fetcher: Arc<dyn Fetch>,
    layout: Arc<MirrorLayout>,
    gate: Arc<Semaphore>,
    state: Arc<MirrorState>,
    task: DownloadTask,
) -> Result<Vec<Url>, DownloadError> {
    let _permit = gate
        .acquire_owned()
        .await
        .map_err(|e| DownloadError::Aborted(e.to_string()))?;

    let module_path = normalize_module_path(&MirrorLayout::module_path(&task.url));
    let target = layout.local_file(&module_path);
    info!(
        "Downloading {} -> {}",
        task.url,
        make_relative_to_cwd(&target).display()
    );

    let content = fetcher.fetch(&task.url).await?;

    let text = match String::from_utf8(content) {
        Ok(text) => {
            let rewritten = rewrite_specifiers(&text, &layout.specifier_prefix());
            write_module(&target, rewritten.as_bytes()).await?;
            Some(text)
        }
        Err(not_text) => {
            debug!("{} is not UTF-8 text, storing it verbatim", task.url);
            write_module(&target, not_text.as_bytes()).await?;
            None
        }
    };

    if !task.specifiers.is_empty() {
        let mirror_path = layout.mirror_path(&module_path);
        let mut modules = state.modules.lock();
        for specifier in task.specifiers {
            debug!("Mapped {specifier} -> {mirror_path}");
            modules.insert(specifier, mirror_path.clone());
        }
    }

    // Dependencies come from the original text; the rewritten one no longer
    // carries the CDN paths. The query never names a directory.
    let Some(text) = text else {
        return Ok(Vec::new());
    };
    let children = module_dependencies(&text, strip_query(&module_path))
        .iter()
        .map(|dependency| task.url.join(dependency))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(children)
}

async fn write_module(target: &Path, body: &[u8]) -> Result<(), DownloadError> {
    let write_error = |source| DownloadError::Write {
        path: target.to_path_buf(),
        source,
    };
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(target, body).await.map_err(write_error)
}
