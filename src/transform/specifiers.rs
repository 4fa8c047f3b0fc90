use crate::dependencies::js::{import_sites, module_source_type};
use crate::mirror::normalize::normalize_module_path;

use super::splice;

/// Point every absolute specifier in `source_text` at the local mirror.
///
/// `prefix` is `[base_path]/<host>` (see `MirrorLayout::specifier_prefix`).
/// Specifiers that already start with it are left untouched, so rewriting
/// rewritten text changes nothing. Relative and bare specifiers are kept.
pub fn rewrite_specifiers(source_text: &str, prefix: &str) -> String {
    let marker = format!("{prefix}/");

    let replacements: Vec<_> = import_sites(source_text, module_source_type())
        .into_iter()
        .filter(|site| {
            let specifier = site.specifier.as_str();
            specifier.starts_with('/')
                && !specifier.starts_with("//")
                && !specifier.starts_with(&marker)
        })
        .map(|site| {
            let replacement = format!("{prefix}{}", normalize_module_path(&site.specifier));
            (site.range, replacement)
        })
        .collect();

    if replacements.is_empty() {
        return source_text.to_string();
    }
    splice(source_text, replacements)
}
