use std::collections::HashSet;

use log::{debug, warn};

use crate::dependencies::js::{import_sites, module_source_type};
use crate::mirror::normalize::split_query;

/// Absolute module paths a fetched module depends on, in source order.
///
/// `module_path` is the normalized path the module was mirrored to (for example
/// `/pkg@1.0.0/index.js`); relative specifiers resolve against its directory.
/// Bare specifiers and full URLs are left alone. Entries are unique by path with
/// the query removed; the first occurrence keeps its query.
pub fn module_dependencies(source_text: &str, module_path: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dependencies = Vec::new();

    for site in import_sites(source_text, module_source_type()) {
        let (path, query) = split_query(&site.specifier);

        let resolved = if path.starts_with("//") {
            continue;
        } else if path.starts_with('/') {
            path.to_string()
        } else if is_relative(path) {
            match resolve_relative(module_path, path) {
                Some(resolved) => resolved,
                None => {
                    warn!(
                        "Dropping '{}' from {}: resolves above the mirror root",
                        site.specifier, module_path
                    );
                    continue;
                }
            }
        } else {
            continue;
        };

        if seen.insert(resolved.clone()) {
            debug!("Found dependency {resolved}{query} in {module_path}");
            dependencies.push(format!("{resolved}{query}"));
        }
    }

    dependencies
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve `specifier` against the directory of `module_path`, ignoring its
/// query. `None` when the result would climb above `/`.
pub fn resolve_relative(module_path: &str, specifier: &str) -> Option<String> {
    let (module_path, _) = split_query(module_path);
    let mut segments: Vec<&str> = module_path.split('/').filter(|s| !s.is_empty()).collect();
    // drop the file name, keep its directory
    segments.pop();

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(format!("/{}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn resolves_relative_imports_against_module_directory() {
        let deps = module_dependencies(
            r#"export * from "./utils.mjs"; import "./lib/a.mjs";"#,
            "/pkg@1.0.0/index.js",
        );
        assert_eq!(deps, vec!["/pkg@1.0.0/utils.mjs", "/pkg@1.0.0/lib/a.mjs"]);
    }

    #[rstest]
    #[case("/pkg@1.0.0/es2022/pkg.mjs", "../shared.mjs", Some("/pkg@1.0.0/shared.mjs"))]
    #[case("/pkg@1.0.0/es2022/pkg.mjs", "./././x.mjs", Some("/pkg@1.0.0/es2022/x.mjs"))]
    #[case("/pkg@1.0.0/index.js", "../other@2.0.0/x.mjs", Some("/other@2.0.0/x.mjs"))]
    #[case("/pkg@1.0.0/index.js", "../../escape.mjs", None)]
    #[case("/index.js", "../x.mjs", None)]
    #[case("/pkg@1.0.0/index.js?deps=@scope/dep@1.0.0", "./utils.mjs", Some("/pkg@1.0.0/utils.mjs"))]
    #[case("/pkg@1.0.0/es2022/pkg.mjs?alias=a/b/c", "../x.mjs", Some("/pkg@1.0.0/x.mjs"))]
    fn resolves_parent_segments(
        #[case] module_path: &str,
        #[case] specifier: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            resolve_relative(module_path, specifier).as_deref(),
            expected
        );
    }

    #[test]
    fn drops_specifiers_escaping_the_root() {
        let deps = module_dependencies(
            r#"import "../../../etc/passwd.mjs"; import "/ok@1.0.0/ok.mjs";"#,
            "/pkg@1.0.0/index.js",
        );
        assert_eq!(deps, vec!["/ok@1.0.0/ok.mjs"]);
    }

    #[test]
    fn keeps_query_and_dedups_without_it() {
        let deps = module_dependencies(
            r#"import "/react@19.0.0?target=es2022";
import * as R from "/react@19.0.0";
import { x } from "/scheduler@0.25.0/es2022/scheduler.mjs";"#,
            "/react-dom@19.0.0/index.js",
        );
        assert_eq!(
            deps,
            vec![
                "/react@19.0.0?target=es2022",
                "/scheduler@0.25.0/es2022/scheduler.mjs",
            ]
        );
    }

    #[test]
    fn ignores_bare_and_remote_specifiers() {
        let deps = module_dependencies(
            r#"import "react"; import "https://other.cdn/x.js"; import "//proto.relative/y.js";"#,
            "/pkg@1.0.0/index.js",
        );
        assert!(deps.is_empty());
    }
}
