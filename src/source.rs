//! Line-oriented access to document files.
//!
//! Readers consume documents through the [`LineSource`] trait so tests can
//! substitute in-memory sources for real files, and through [`Slice`], which
//! restricts a source to the window of lines assigned to one client.

use crate::error::ParamsError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source of newline-terminated document lines.
pub trait LineSource: Send {
    /// Open the underlying resource. Called once before the first read.
    fn open(&mut self) -> Result<(), ParamsError>;

    /// Read up to `max_lines` lines, without trailing newlines. An empty
    /// result means the source is exhausted.
    fn read_lines(&mut self, max_lines: usize) -> Result<Vec<String>, ParamsError>;

    /// Release the underlying resource.
    fn close(&mut self);

    /// Human-readable name for error messages.
    fn name(&self) -> String;
}

/// In-memory line source, used by tests.
pub struct StringLineSource {
    lines: Vec<String>,
    cursor: usize,
}

impl StringLineSource {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines, cursor: 0 }
    }
}

impl From<&str> for StringLineSource {
    fn from(text: &str) -> Self {
        StringLineSource::new(text.lines().map(str::to_string).collect())
    }
}

impl LineSource for StringLineSource {
    fn open(&mut self) -> Result<(), ParamsError> {
        self.cursor = 0;
        Ok(())
    }

    fn read_lines(&mut self, max_lines: usize) -> Result<Vec<String>, ParamsError> {
        let start = self.cursor;
        let end = (start + max_lines).min(self.lines.len());
        self.cursor = end;
        Ok(self.lines[start..end].to_vec())
    }

    fn close(&mut self) {}

    fn name(&self) -> String {
        "<string>".to_string()
    }
}

/// Buffered file-backed line source.
pub struct FileLineSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileLineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
        }
    }
}

impl LineSource for FileLineSource {
    fn open(&mut self) -> Result<(), ParamsError> {
        debug!(path = %self.path.display(), "opening document file");
        self.reader = Some(BufReader::new(File::open(&self.path)?));
        Ok(())
    }

    fn read_lines(&mut self, max_lines: usize) -> Result<Vec<String>, ParamsError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(ParamsError::assertion(format!(
                "file source [{}] is not open",
                self.path.display()
            )));
        };
        let mut lines = Vec::with_capacity(max_lines);
        let mut buffer = String::new();
        while lines.len() < max_lines {
            buffer.clear();
            if reader.read_line(&mut buffer)? == 0 {
                break;
            }
            lines.push(buffer.trim_end_matches(['\n', '\r']).to_string());
        }
        Ok(lines)
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Open a file-backed line source for the given path.
pub fn file_source(path: &Path) -> Box<dyn LineSource> {
    Box::new(FileLineSource::new(path))
}

/// A window into a line source: skips `offset` lines on open and reads at
/// most `number_of_lines` lines in total.
pub struct Slice {
    source: Box<dyn LineSource>,
    offset: u64,
    number_of_lines: u64,
    current_line: u64,
}

impl Slice {
    pub fn new(source: Box<dyn LineSource>, offset: u64, number_of_lines: u64) -> Self {
        Self {
            source,
            offset,
            number_of_lines,
            current_line: 0,
        }
    }

    pub fn open(&mut self) -> Result<(), ParamsError> {
        self.source.open()?;
        // Advance to the start of this client's window.
        let mut to_skip = self.offset;
        while to_skip > 0 {
            let batch = to_skip.min(65536) as usize;
            let skipped = self.source.read_lines(batch)?.len() as u64;
            if skipped == 0 {
                break;
            }
            to_skip -= skipped;
        }
        self.current_line = 0;
        debug!(
            source = %self.source.name(),
            offset = self.offset,
            number_of_lines = self.number_of_lines,
            "opened file slice"
        );
        Ok(())
    }

    /// Read up to `max_lines` lines, bounded by the slice window.
    pub fn read_batch(&mut self, max_lines: usize) -> Result<Vec<String>, ParamsError> {
        let remaining = self.number_of_lines - self.current_line;
        if remaining == 0 {
            return Ok(Vec::new());
        }
        let lines = self
            .source
            .read_lines(remaining.min(max_lines as u64) as usize)?;
        self.current_line += lines.len() as u64;
        Ok(lines)
    }

    pub fn close(&mut self) {
        self.source.close();
    }

    pub fn source_name(&self) -> String {
        self.source.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{{\"key\": \"value{i}\"}}")).collect()
    }

    #[test]
    fn test_slice_reads_whole_source() {
        let mut slice = Slice::new(Box::new(StringLineSource::new(lines(5))), 0, 5);
        slice.open().unwrap();
        assert_eq!(slice.read_batch(50).unwrap(), lines(5));
        assert!(slice.read_batch(50).unwrap().is_empty());
    }

    #[test]
    fn test_slice_skips_offset_lines() {
        let mut slice = Slice::new(Box::new(StringLineSource::new(lines(5))), 3, 5);
        slice.open().unwrap();
        assert_eq!(slice.read_batch(50).unwrap(), lines(5)[3..].to_vec());
    }

    #[test]
    fn test_slice_is_bounded_by_window() {
        let mut slice = Slice::new(Box::new(StringLineSource::new(lines(7))), 0, 5);
        slice.open().unwrap();
        assert_eq!(slice.read_batch(3).unwrap().len(), 3);
        assert_eq!(slice.read_batch(3).unwrap().len(), 2);
        assert!(slice.read_batch(3).unwrap().is_empty());
    }

    #[test]
    fn test_slice_over_file_source() {
        use std::io::Write;
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("docs.json");
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines(4) {
            writeln!(file, "{line}").unwrap();
        }
        drop(file);

        let mut slice = Slice::new(file_source(&path), 1, 2);
        slice.open().unwrap();
        assert_eq!(slice.read_batch(10).unwrap(), lines(4)[1..3].to_vec());
        slice.close();
    }
}
