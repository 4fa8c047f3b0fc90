use std::ops::Range;

pub mod extensions;
pub mod specifiers;

pub use extensions::patch_local_extensions;
pub use specifiers::rewrite_specifiers;

/// Replace non-overlapping byte ranges of `source_text`. Ranges must be sorted.
fn splice(source_text: &str, replacements: Vec<(Range<usize>, String)>) -> String {
    let mut output = String::with_capacity(source_text.len());
    let mut cursor = 0;
    for (range, replacement) in replacements {
        if range.start < cursor {
            continue;
        }
        output.push_str(&source_text[cursor..range.start]);
        output.push_str(&replacement);
        cursor = range.end;
    }
    output.push_str(&source_text[cursor..]);
    output
}
