//! Line-delimited JSON event reading.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::RawEventRecord;

/// Reads one [`RawEventRecord`] per line of JSON.
///
/// Blank lines are skipped. Errors carry the 1-based line number they came
/// from, so a broken line in a large capture can be found and fixed.
#[derive(Debug)]
pub struct JsonlEventReader<R> {
    lines: Lines<BufReader<R>>,
    line: usize,
}

impl JsonlEventReader<File> {
    /// Opens a JSONL event file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> JsonlEventReader<R> {
    /// Wraps any byte source.
    pub fn new(source: R) -> Self {
        Self {
            lines: BufReader::new(source).lines(),
            line: 0,
        }
    }

    /// Reads every remaining record, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first I/O or parse error.
    pub fn read_all(self) -> Result<Vec<RawEventRecord>> {
        self.collect()
    }
}

impl<R: Read> Iterator for JsonlEventReader<R> {
    type Item = Result<RawEventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line += 1;
            match self.lines.next()? {
                Ok(text) if text.trim().is_empty() => {}
                Ok(text) => {
                    return Some(serde_json::from_str(&text).map_err(|source| {
                        Error::InvalidRecord {
                            line: self.line,
                            source,
                        }
                    }));
                }
                Err(source) => return Some(Err(Error::Io(source))),
            }
        }
    }
}
