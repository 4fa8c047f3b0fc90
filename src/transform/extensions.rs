use std::collections::HashSet;

use crate::dependencies::js::{import_sites, module_source_type};
use crate::dependencies::module::is_relative;
use crate::mirror::normalize::split_query;

use super::splice;

const SOURCE_EXTENSIONS: [&str; 3] = [".tsx", ".ts", ".jsx"];

/// Compiled output never keeps `.ts`/`.tsx`/`.jsx` files around, so relative
/// imports of them are redirected to the compiled `.js` sibling.
///
/// `probed` holds extensionless relative specifiers whose file was found by
/// trying source extensions; they get `.js` appended.
pub fn patch_local_extensions(code: &str, probed: &HashSet<String>) -> String {
    let replacements: Vec<_> = import_sites(code, module_source_type())
        .into_iter()
        .filter(|site| is_relative(&site.specifier))
        .filter_map(|site| {
            let (path, query) = split_query(&site.specifier);
            if probed.contains(path) {
                return Some((site.range, format!("{path}.js{query}")));
            }
            let stem = SOURCE_EXTENSIONS
                .iter()
                .find_map(|ext| path.strip_suffix(ext))?;
            Some((site.range, format!("{stem}.js{query}")))
        })
        .collect();

    if replacements.is_empty() {
        return code.to_string();
    }
    splice(code, replacements)
}
