use std::fmt::{self, Display, Formatter, Write};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use ndarray::iter::Windows;
use ndarray::prelude::*;
use nom::{
    character::complete::satisfy,
    combinator::map,
    multi::many1,
    IResult,
};

use crate::error::{LoadError, ParseError};

/// An energy grid exactly as it was read, without any border.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    cells: Array2<u8>,
}

/// An energy grid surrounded by a one-cell border of zeroes.
///
/// The border is there so that every interior cell has eight
/// neighbours.  It is zero for the lifetime of the value: the only
/// ways to build a `PaddedGrid` are [`Grid::pad`] and
/// [`PaddedGrid::from_interior`], and nothing mutates one in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddedGrid {
    cells: Array2<u8>,
}

fn cell_char(energy: u8) -> char {
    match energy {
        0..=9 => char::from(b'0' + energy),
        _ => '*', // still flashing
    }
}

fn write_rows(f: &mut Formatter<'_>, cells: ArrayView2<u8>) -> fmt::Result {
    for row in cells.rows() {
        for energy in row.iter() {
            f.write_char(cell_char(*energy))?;
        }
        f.write_str("\n")?;
    }
    Ok(())
}

impl Grid {
    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[(row, col)]
    }

    pub fn pad(&self) -> PaddedGrid {
        PaddedGrid::from_interior(self.cells.clone())
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_rows(f, self.cells.view())
    }
}

impl FromStr for Grid {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Grid, ParseError> {
        parse_grid(s)
    }
}

impl PaddedGrid {
    /// Surrounds `interior` with a zero border.
    pub fn from_interior(interior: Array2<u8>) -> PaddedGrid {
        let (rows, cols) = interior.dim();
        let mut cells = Array2::zeros((rows + 2, cols + 2));
        cells.slice_mut(s![1..-1, 1..-1]).assign(&interior);
        PaddedGrid { cells }
    }

    /// Number of interior rows.
    pub fn rows(&self) -> usize {
        self.cells.nrows() - 2
    }

    /// Number of interior columns.
    pub fn cols(&self) -> usize {
        self.cells.ncols() - 2
    }

    pub fn cell_count(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Energy of an interior cell; `(0, 0)` is the top-left interior
    /// cell, not the border.
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[(row + 1, col + 1)]
    }

    pub fn interior(&self) -> ArrayView2<'_, u8> {
        self.cells.slice(s![1..-1, 1..-1])
    }

    /// The whole grid including the border.
    pub fn cells(&self) -> ArrayView2<'_, u8> {
        self.cells.view()
    }

    /// The 3x3 neighbourhood of every interior cell, in the same order
    /// and shape as [`PaddedGrid::interior`].  The centre of each
    /// window is the cell itself.
    pub fn neighbourhoods(&self) -> Windows<'_, u8, Ix2> {
        self.cells.windows((3, 3))
    }

    /// Adds one to every interior cell.  Energies saturate at 255
    /// rather than wrapping.
    pub fn increment_interior(&self) -> PaddedGrid {
        let mut cells = self.cells.clone();
        cells
            .slice_mut(s![1..-1, 1..-1])
            .mapv_inplace(|energy| energy.saturating_add(1));
        PaddedGrid { cells }
    }

    pub fn count_zero_interior(&self) -> usize {
        self.interior().iter().filter(|energy| **energy == 0).count()
    }

    pub fn all_interior_zero(&self) -> bool {
        self.count_zero_interior() == self.cell_count()
    }
}

impl Display for PaddedGrid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_rows(f, self.cells.view())
    }
}

fn digit_row(input: &str) -> IResult<&str, Vec<u8>> {
    many1(map(satisfy(|ch| ch.is_ascii_digit()), |ch| ch as u8 - b'0'))(input)
}

fn parse_row(text: &str, line: usize) -> Result<Vec<u8>, ParseError> {
    let (unparsed, row) = match digit_row(text) {
        Ok((unparsed, row)) => (unparsed, row),
        Err(_) => (text, Vec::new()),
    };
    match unparsed.chars().next() {
        None => Ok(row),
        Some(ch) => Err(ParseError::BadCell {
            line,
            // Everything before `unparsed` is ASCII digits.
            column: row.len() + 1,
            ch,
            text: text.to_string(),
        }),
    }
}

/// Parses rows of single-digit energies.  Blank lines are skipped.
pub fn parse_grid(text: &str) -> Result<Grid, ParseError> {
    let mut rows: Vec<Vec<u8>> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        // `lines` leaves a lone `\r` at the very end of the input.
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        let row = parse_row(line, index + 1)?;
        if let Some(first) = rows.first() {
            if row.len() != first.len() {
                return Err(ParseError::RaggedRow {
                    line: index + 1,
                    expected: first.len(),
                    got: row.len(),
                    text: line.to_string(),
                });
            }
        }
        rows.push(row);
    }
    let width = match rows.first() {
        Some(row) => row.len(),
        None => {
            return Err(ParseError::Empty);
        }
    };
    let cells = Array::from_shape_fn((rows.len(), width), |(r, c)| rows[r][c]);
    Ok(Grid { cells })
}

/// Reads and parses a grid.  The path `-` means standard input.
pub fn load_grid(path: &Path) -> Result<Grid, LoadError> {
    let read = if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        fs::read_to_string(path)
    };
    let text = read.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_grid(&text)?)
}

#[cfg(test)]
fn grid_of(lines: &[&str]) -> Grid {
    parse_grid(&lines.join("\n")).expect("valid test data")
}

#[test]
fn test_parse_grid() {
    let grid = grid_of(&["123", "456"]);
    assert_eq!(grid.rows(), 2);
    assert_eq!(grid.cols(), 3);
    assert_eq!(grid.get(0, 0), 1);
    assert_eq!(grid.get(1, 2), 6);
    assert_eq!(grid.to_string(), "123\n456\n");
}

#[test]
fn test_parse_grid_skips_blank_lines() {
    let grid = parse_grid("12\r\n34\r\n\r\n\n").expect("valid");
    assert_eq!(grid, grid_of(&["12", "34"]));
    let grid = parse_grid("\n12\n\n34\n").expect("valid");
    assert_eq!(grid, grid_of(&["12", "34"]));
    let grid = parse_grid("12\r\n34\r").expect("valid");
    assert_eq!(grid, grid_of(&["12", "34"]));
    let grid = parse_grid("12\r").expect("valid");
    assert_eq!(grid, grid_of(&["12"]));
}

#[test]
fn test_parse_grid_errors() {
    assert_eq!(parse_grid(""), Err(ParseError::Empty));
    assert_eq!(parse_grid("\n  \n"), Err(ParseError::Empty));
    assert_eq!(
        parse_grid("123\n4x6\n"),
        Err(ParseError::BadCell {
            line: 2,
            column: 2,
            ch: 'x',
            text: "4x6".to_string(),
        })
    );
    assert_eq!(
        parse_grid("-12"),
        Err(ParseError::BadCell {
            line: 1,
            column: 1,
            ch: '-',
            text: "-12".to_string(),
        })
    );
    assert_eq!(
        parse_grid("123\n\n4567\n"),
        Err(ParseError::RaggedRow {
            line: 3,
            expected: 3,
            got: 4,
            text: "4567".to_string(),
        })
    );
}

#[test]
fn test_pad() {
    let padded = grid_of(&["12", "34"]).pad();
    assert_eq!(padded.rows(), 2);
    assert_eq!(padded.cols(), 2);
    assert_eq!(padded.cell_count(), 4);
    assert_eq!(padded.to_string(), "0000\n0120\n0340\n0000\n");
    assert_eq!(padded.get(0, 0), 1);
    assert_eq!(padded.get(1, 1), 4);
    assert_eq!(padded.interior(), array![[1u8, 2], [3, 4]]);
    assert_eq!(padded.neighbourhoods().into_iter().count(), 4);
}

#[test]
fn test_increment_interior() {
    let bumped = grid_of(&["09", "90"]).pad().increment_interior();
    assert_eq!(bumped.interior(), array![[1u8, 10], [10, 1]]);
    assert_eq!(bumped.to_string(), "0000\n01*0\n0*10\n0000\n");
    let border_sum: u32 = bumped.cells().iter().map(|e| u32::from(*e)).sum::<u32>()
        - bumped.interior().iter().map(|e| u32::from(*e)).sum::<u32>();
    assert_eq!(border_sum, 0);
}

#[test]
fn test_increment_interior_saturates() {
    let full = PaddedGrid::from_interior(array![[255u8, 17], [0, 9]]);
    let bumped = full.increment_interior();
    assert_eq!(bumped.interior(), array![[255u8, 18], [1, 10]]);
    assert_eq!(bumped.cells().iter().filter(|e| **e != 0).count(), 4);
}

#[test]
fn test_zero_queries() {
    let some = grid_of(&["010", "000"]).pad();
    assert_eq!(some.count_zero_interior(), 5);
    assert!(!some.all_interior_zero());
    let all = grid_of(&["000", "000"]).pad();
    assert_eq!(all.count_zero_interior(), 6);
    assert!(all.all_interior_zero());
}

#[test]
fn test_equality_includes_shape() {
    let a = grid_of(&["12", "34"]).pad();
    assert_eq!(a, grid_of(&["12", "34"]).pad());
    assert_ne!(a, grid_of(&["12", "35"]).pad());
    assert_ne!(a, grid_of(&["1234"]).pad());
}

#[test]
fn test_load_grid() {
    let path = std::env::temp_dir().join(format!("dumbo-load-{}.txt", std::process::id()));
    fs::write(&path, "11\n19\n").expect("can write temp file");
    let loaded = load_grid(&path);
    let _ = fs::remove_file(&path);
    assert_eq!(loaded.expect("valid file"), grid_of(&["11", "19"]));

    match load_grid(Path::new("/nonexistent/dumbo/grid.txt")) {
        Err(LoadError::Io { path, .. }) => {
            assert_eq!(path, Path::new("/nonexistent/dumbo/grid.txt"));
        }
        other => panic!("expected an I/O error, got {:?}", other),
    }
}
