/*!
 * Utility functions for dirscan
 */

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Format a count with human-readable units
pub fn format_count(num: usize) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

/// Shorten a path for display, keeping its trailing segments
pub fn shorten_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let mut segments = Vec::new();
    let mut current_len = 3; // "..."
    for part in path.rsplit(['/', '\\']) {
        let part_len = part.chars().count() + 1;
        if current_len + part_len > max_len {
            break;
        }
        segments.push(part);
        current_len += part_len;
    }

    if segments.is_empty() {
        // a single segment longer than the budget: keep its tail
        let tail: String = path
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return format!("...{}", tail);
    }

    let mut result = String::from("...");
    for part in segments.iter().rev() {
        result.push('/');
        result.push_str(part);
    }
    result
}

/// Patterns excluded from scans unless `--no-default-excludes` is given
pub const DEFAULT_EXCLUDE: &[&str] = &[
    // Version Control
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    // OS Files
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    // Dependencies
    "node_modules",
    "bower_components",
    ".pnpm-store",
    // Python
    "__pycache__",
    ".pytest_cache",
    ".venv",
    "venv",
    "*.egg-info",
    // Rust
    "target",
    // IDEs & Editors
    ".idea",
    ".vscode",
    // Other Build Tools
    ".gradle",
    ".next",
    ".terraform",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(2_000_000), "2.0M");
    }

    #[test]
    fn test_shorten_path_keeps_tail() {
        assert_eq!(shorten_path("src/main.rs", 60), "src/main.rs");
        assert_eq!(shorten_path("a/very/long/path/to/file.rs", 15), ".../to/file.rs");
        assert_eq!(shorten_path("abcdefghijklmnop", 8), "...lmnop");
    }
}
