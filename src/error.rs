use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems with the text of an energy grid.
///
/// Line and column numbers are 1-based and refer to the original
/// input, blank lines included.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no data: the grid has no rows")]
    Empty,
    #[error("line {line}, column {column}: invalid (non-numeric) cell '{ch}' in '{text}'")]
    BadCell {
        line: usize,
        column: usize,
        ch: char,
        text: String,
    },
    #[error("line {line}: expected {expected} cells, got {got} in '{text}'")]
    RaggedRow {
        line: usize,
        expected: usize,
        got: usize,
        text: String,
    },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}
