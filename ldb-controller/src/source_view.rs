//! Minimal source view for `ls` (SPEC_FULL.md §4.7 "Source view").
//!
//! The controller's full terminal/source-viewer UI is out of scope
//! (spec.md §1); this supplies only the `ls` contract spec.md §6 actually
//! asks for: resolve a file against the `--source` search path plus the
//! debuggee-reported full path, then print a fixed window of numbered
//! lines. No syntax highlighting, no pager state beyond "current file,
//! current line".

use std::path::{Path, PathBuf};

/// Where the view is currently parked, updated on every `BR` and every
/// explicit `ls <file>`.
#[derive(Debug, Default, Clone)]
pub struct SourceView {
    pub search_path: Vec<String>,
    pub current_file: Option<String>,
    pub current_line: u32,
}

impl SourceView {
    pub fn new(search_path: Vec<String>) -> Self {
        Self {
            search_path,
            current_file: None,
            current_line: 1,
        }
    }

    pub fn add_source_dir(&mut self, dir: String) {
        self.search_path.push(dir);
    }

    /// Resolve `file` (a basename or relative hint) against the search path,
    /// falling back to `fullpath` verbatim if nothing in the search path
    /// exists.
    pub fn resolve(&self, file: &str, fullpath: &str) -> PathBuf {
        for dir in &self.search_path {
            let candidate = Path::new(dir).join(file);
            if candidate.exists() {
                return candidate;
            }
        }
        PathBuf::from(fullpath)
    }

    /// Note the debuggee's reported position (spec.md §4.7 step 1).
    pub fn on_break(&mut self, basename: &str, line: u32) {
        self.current_file = Some(basename.to_string());
        self.current_line = line;
    }

    /// Render `count` lines of `path`, centered on `line` (or starting at
    /// `line` if centering would run off the top), with line numbers.
    pub fn render(path: &Path, line: u32, count: u32) -> std::io::Result<String> {
        let text = std::fs::read_to_string(path)?;
        let lines: Vec<&str> = text.lines().collect();
        let line = line.max(1) as usize;
        let half = (count / 2) as usize;
        let start = line.saturating_sub(half).max(1);
        let end = (start + count as usize).min(lines.len() + 1);

        let mut out = String::new();
        for (i, text) in lines.iter().enumerate().take(end - 1).skip(start - 1) {
            let marker = if i + 1 == line { "->" } else { "  " };
            out.push_str(&format!("{marker} {:4} {text}\n", i + 1));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolve_falls_back_to_fullpath_when_not_found_in_search_path() {
        let view = SourceView::new(vec!["/no/such/dir".to_string()]);
        assert_eq!(
            view.resolve("a.lua", "/abs/a.lua"),
            PathBuf::from("/abs/a.lua")
        );
    }

    #[test]
    fn render_marks_the_current_line() {
        let mut file = tempfile_like();
        writeln!(file.1, "one\ntwo\nthree\nfour\nfive").unwrap();
        let rendered = SourceView::render(&file.0, 3, 4).unwrap();
        assert!(rendered.lines().any(|l| l.starts_with("->") && l.contains("three")));
    }

    fn tempfile_like() -> (PathBuf, std::fs::File) {
        let path = std::env::temp_dir().join(format!("ldb-source-view-test-{}", std::process::id()));
        let file = std::fs::File::create(&path).unwrap();
        (path, file)
    }
}
