// Source buffers with a precomputed line-start table so that byte offsets
// map to (line, column) in O(log n).

use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file not found: `{0}`")]
    FileNotFound(String),
}

/// Immutable source text plus its identifier (file name or memory tag).
#[derive(Debug, Clone)]
pub struct Source {
    inner: Arc<SourceInner>,
}

#[derive(Debug)]
struct SourceInner {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn load_from_disk(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| SourceError::FileNotFound(path.display().to_string()))?;
        Ok(Self::from_parts(path.display().to_string(), text))
    }

    pub fn load_from_memory(text: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), text.into())
    }

    fn from_parts(name: String, text: String) -> Self {
        let mut line_starts = vec![0usize];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self {
            inner: Arc::new(SourceInner {
                name,
                text,
                line_starts,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// 1-based (line, column) for a byte offset. Offsets past the end clamp
    /// to the last line.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let starts = &self.inner.line_starts;
        let line = starts.partition_point(|&s| s <= offset);
        let line_start = starts[line - 1];
        (line, offset - line_start + 1)
    }

    /// Text of a 1-based line, without the trailing newline.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let starts = &self.inner.line_starts;
        if line == 0 || line > starts.len() {
            return None;
        }
        let start = starts[line - 1];
        let end = starts
            .get(line)
            .map(|&next| next.saturating_sub(1))
            .unwrap_or(self.inner.text.len());
        self.inner.text.get(start..end)
    }
}

/// Owns every source loaded during one compilation. Imported files register
/// here so their spans stay resolvable for the lifetime of the module.
#[derive(Debug, Default)]
pub struct SourceManager {
    sources: Vec<Source>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_disk(&mut self, path: &Path) -> Result<Source, SourceError> {
        let source = Source::load_from_disk(path)?;
        self.sources.push(source.clone());
        Ok(source)
    }

    pub fn load_from_memory(
        &mut self,
        text: impl Into<String>,
        name: impl Into<String>,
    ) -> Source {
        let source = Source::load_from_memory(text, name);
        self.sources.push(source.clone());
        source
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_lookup() {
        let source = Source::load_from_memory("ab\ncd\n\nef", "mem");
        assert_eq!(source.line_col(0), (1, 1));
        assert_eq!(source.line_col(1), (1, 2));
        assert_eq!(source.line_col(3), (2, 1));
        assert_eq!(source.line_col(4), (2, 2));
        assert_eq!(source.line_col(6), (3, 1));
        assert_eq!(source.line_col(7), (4, 1));
    }

    #[test]
    fn line_text_extraction() {
        let source = Source::load_from_memory("first\nsecond\nthird", "mem");
        assert_eq!(source.line_text(1), Some("first"));
        assert_eq!(source.line_text(2), Some("second"));
        assert_eq!(source.line_text(3), Some("third"));
        assert_eq!(source.line_text(4), None);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Source::load_from_disk(Path::new("/nonexistent/file.vcl"));
        assert!(matches!(err, Err(SourceError::FileNotFound(_))));
    }
}
