pub mod coordinator;
pub mod fetch;
pub mod layout;
pub mod normalize;

pub use coordinator::DownloadCoordinator;
pub use fetch::{Fetch, FetchFuture, HttpFetcher};
pub use layout::MirrorLayout;
pub use normalize::normalize_module_path;
