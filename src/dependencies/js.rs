use std::ops::Range;
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use oxc::{
    allocator::Allocator,
    ast::ast::{
        ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration,
        ImportExpression, StringLiteral,
    },
    ast_visit::{Visit, walk},
    parser::{Parser, ParserReturn},
    span::SourceType,
};
use regex::Regex;

use crate::errors::{DependencyError, DependencyResult};

lazy_static! {
    // import x from, import {..} from, import * as x from, import x, {..} from,
    // import(...), bare import, export * [as x] from, export {..} from
    static ref IMPORT_SITE_RE: Regex = Regex::new(
        r#"(?:\bimport\s*(?:[\w$]+\s*,?\s*)?(?:\*\s*as\s*[\w$]+|\{[^}]*\})?\s*from|\bimport\s*\(|\bimport|\bexport\s*\*\s*(?:as\s+[\w$]+\s*)?from|\bexport\s*\{[^}]*\}\s*from)\s*["']([^"'\r\n]+)["']"#
    )
    .unwrap();
}

/// A module specifier string found in an import or export form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub specifier: String,
    /// Byte range of the specifier inside the source text, quotes excluded.
    pub range: Range<usize>,
}

pub fn module_source_type() -> SourceType {
    SourceType::default().with_module(true)
}

/// Source type for an application file, inferred from its extension.
pub fn source_type_for_path(path: &Path) -> SourceType {
    SourceType::from_path(path)
        .unwrap_or_default()
        .with_module(true)
}

/// Every import/export specifier in `source_text`, ordered by position.
///
/// Uses the oxc parser; text it rejects is scanned with a pattern matcher
/// instead, which covers the same statement forms but can be fooled by
/// comments and string contents.
pub fn import_sites(source_text: &str, source_type: SourceType) -> Vec<ImportSite> {
    match import_sites_from_ast(source_text, source_type) {
        Ok(sites) => sites,
        Err(e) => {
            debug!("Falling back to pattern scan: {e}");
            import_sites_from_text(source_text)
        }
    }
}

pub fn import_sites_from_ast(
    source_text: &str,
    source_type: SourceType,
) -> DependencyResult<Vec<ImportSite>> {
    // Memory arena where AST nodes are allocated.
    let allocator = Allocator::default();

    let ParserReturn {
        program,
        errors: parser_errors,
        panicked,
        ..
    } = Parser::new(&allocator, source_text, source_type).parse();

    if panicked {
        return Err(DependencyError::JsPanicParse);
    }

    if !parser_errors.is_empty() {
        let error_messages: Vec<String> =
            parser_errors.iter().map(|e| format!("{:?}", e)).collect();
        return Err(DependencyError::JsParse {
            message: format!("Parser errors: {}", error_messages.join(", ")),
        });
    }

    let mut visitor = ImportSiteVisitor::new(source_text.len());
    visitor.visit_program(&program);

    let mut sites = visitor.sites;
    sites.sort_by_key(|site| site.range.start);
    Ok(sites)
}

pub fn import_sites_from_text(source_text: &str) -> Vec<ImportSite> {
    IMPORT_SITE_RE
        .captures_iter(source_text)
        .filter_map(|captures| captures.get(1))
        .map(|m| ImportSite {
            specifier: m.as_str().to_string(),
            range: m.range(),
        })
        .collect()
}

struct ImportSiteVisitor {
    source_len: usize,
    sites: Vec<ImportSite>,
}

impl ImportSiteVisitor {
    fn new(source_len: usize) -> Self {
        Self {
            source_len,
            sites: Vec::new(),
        }
    }

    fn extract_string_literal(&mut self, literal: &StringLiteral) {
        // span includes the quotes
        let start = literal.span.start as usize;
        let end = literal.span.end as usize;
        if end < start + 2 || end > self.source_len {
            return;
        }
        self.sites.push(ImportSite {
            specifier: literal.value.to_string(),
            range: start + 1..end - 1,
        });
    }
}

impl<'a> Visit<'a> for ImportSiteVisitor {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.extract_string_literal(&decl.source);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.extract_string_literal(&decl.source);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.extract_string_literal(source);
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &expr.source {
            self.extract_string_literal(literal);
        }
        walk::walk_import_expression(self, expr);
    }
}
