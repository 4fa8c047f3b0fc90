use std::path::Path;

use crate::dependencies::js::{import_sites, source_type_for_path};
use crate::dependencies::module::is_relative;
use crate::mirror::normalize::strip_query;

/// Relative imports (`./x`, `../x`) of an application source file, unique and
/// in source order, with any query removed.
pub fn local_imports(source_text: &str, source_path: &Path) -> Vec<String> {
    let mut imports: Vec<String> = Vec::new();
    for site in import_sites(source_text, source_type_for_path(source_path)) {
        let specifier = strip_query(&site.specifier);
        if is_relative(specifier) && !imports.iter().any(|i| i == specifier) {
            imports.push(specifier.to_string());
        }
    }
    imports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_relative_imports_only() {
        let source = r#"import React from "react";
import App from "./App.tsx";
import "./index.css";
import { helper } from "../shared/helper.ts";
import App2 from "./App.tsx";
const icon = import("./icon.svg?url");
"#;
        assert_eq!(
            local_imports(source, Path::new("src/main.tsx")),
            vec!["./App.tsx", "./index.css", "../shared/helper.ts", "./icon.svg"]
        );
    }
}
