//! Positional parsing of delimited gazetteer files.
//!
//! The first line of a file names the columns, every following line is split
//! on the same delimiter. There is no quoting or escaping: a value containing
//! the delimiter cannot be represented, so source files must not contain one
//! inside a field.
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use tracing::{debug, info, instrument, trace};

pub mod extract;

pub use super::error::Result;

/// Column separator of the GNIS domestic names files.
pub const GAZETTEER_DELIMITER: char = '|';

/// One data line split into its positional cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number in the source, header included.
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRecord {
    /// Pairs every header column with the cell at the same position.
    ///
    /// Only the overlapping `min(header, cells)` columns are produced.
    pub fn columns<'a>(
        &'a self,
        header: &'a [String],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        header
            .iter()
            .zip(&self.cells)
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Streaming reader over a delimited file: header first, then [`RawRecord`]s.
///
/// End of stream ends the iteration without error. Blank lines are skipped.
#[derive(Debug)]
pub struct DelimitedReader<R> {
    header: Vec<String>,
    records: Records<R>,
}

impl<R: BufRead> DelimitedReader<R> {
    /// Reads the header line. An empty stream yields an empty header and no
    /// records.
    pub fn new(reader: R, delimiter: char) -> Result<Self> {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(first) => split_line(&first?, delimiter),
            None => Vec::new(),
        };
        debug!(columns = header.len(), "Read delimited header");
        Ok(Self {
            header,
            records: Records {
                lines,
                delimiter,
                line: 1,
            },
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Splits the reader into its header and the remaining records.
    pub fn into_parts(self) -> (Vec<String>, Records<R>) {
        (self.header, self.records)
    }
}

impl DelimitedReader<BufReader<File>> {
    /// Opens a `|`-delimited gazetteer file.
    #[instrument(name = "Open gazetteer file", level = "info")]
    pub fn open_gazetteer(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = Self::new(BufReader::new(file), GAZETTEER_DELIMITER)?;
        info!(columns = reader.header().len(), "Opened gazetteer file");
        Ok(reader)
    }
}

/// The data lines of a [`DelimitedReader`].
#[derive(Debug)]
pub struct Records<R> {
    lines: Lines<R>,
    delimiter: char,
    line: usize,
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                trace!(line = self.line, "Skipping blank line");
                continue;
            }
            return Some(Ok(RawRecord {
                line: self.line,
                cells: split_line(&line, self.delimiter),
            }));
        }
    }
}

impl<R: BufRead> Iterator for DelimitedReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }
}

fn split_line(line: &str, delimiter: char) -> Vec<String> {
    line.strip_suffix('\r')
        .unwrap_or(line)
        .split(delimiter)
        .map(str::to_owned)
        .collect()
}
