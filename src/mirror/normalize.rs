//! Mapping from CDN module paths to local mirror paths.

const JS_EXTENSIONS: [&str; 3] = [".js", ".mjs", ".cjs"];

/// Split `path?query` into `(path, "?query")`. The query part keeps its `?`.
pub fn split_query(path: &str) -> (&str, &str) {
    match path.find('?') {
        Some(index) => path.split_at(index),
        None => (path, ""),
    }
}

pub fn strip_query(path: &str) -> &str {
    split_query(path).0
}

/// Canonical local path for a CDN module path such as `/react-dom@19.0.0/client`.
///
/// Main-module references (`/react@19.0.0`, `/@scope/pkg`) get `/index.js`,
/// sub-modules get a `.js` suffix when they lack a JS extension. A query string
/// is carried over unchanged. Applying this to its own output is a no-op.
pub fn normalize_module_path(path: &str) -> String {
    let (path, query) = split_query(path);
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.last().copied().unwrap_or("");

    let normalized = match segments.iter().position(|s| s.starts_with('@')) {
        Some(scope_index) => normalize_scoped(path, &segments, scope_index, last),
        None => normalize_plain(path, &segments, last),
    };

    format!("{normalized}{query}")
}

fn normalize_scoped(path: &str, segments: &[&str], scope_index: usize, last: &str) -> String {
    // exactly `@scope/name` with nothing after it
    let is_main = scope_index + 2 == segments.len();

    if is_main || last.is_empty() {
        append_index(path)
    } else if has_js_extension(last) {
        path.to_string()
    } else {
        format!("{path}.js")
    }
}

fn normalize_plain(path: &str, segments: &[&str], last: &str) -> String {
    let versioned_package = segments.len() <= 2 && last.contains('@');

    if versioned_package || last.is_empty() || !path.contains('/') {
        if path.ends_with("/index.js") || path.ends_with("/index.mjs") {
            path.to_string()
        } else {
            append_index(path)
        }
    } else if has_js_extension(last) {
        path.to_string()
    } else {
        format!("{path}.js")
    }
}

fn append_index(path: &str) -> String {
    if path.ends_with('/') {
        format!("{path}index.js")
    } else {
        format!("{path}/index.js")
    }
}

fn has_js_extension(segment: &str) -> bool {
    JS_EXTENSIONS.iter().any(|ext| segment.ends_with(ext))
}
