//! Output file naming

use crate::core::video_info::Container;

const MAX_STEM_CHARS: usize = 200;

/// Turn a video title into a file name that is valid on common file systems
pub fn to_safe_filename(title: &str, container: Container) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == ' ');
    let mut stem: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    stem = stem.trim_end().to_string();

    if stem.is_empty() {
        stem = "video".to_string();
    }

    format!("{}.{}", stem, container.extension())
}
