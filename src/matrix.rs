//! Matrix helpers on top of `nalgebra`.
//!
//! Every per-node and per-time array in the crate is a [`DenseMatrix`] (`nalgebra::DMatrix<f64>`).
//! The mobility network is mostly zeros for realistic geographies, so its diagnostics walk only
//! the non-zero entries ([`nonzero_entries`], [`find_above`]) as `(row, column, value)` triples.

use std::fs;
use std::path::Path;

use nalgebra as na;

use crate::error::SetupError;

pub type DenseMatrix = na::DMatrix<f64>;

/// Builds a matrix from a list of rows.
///
/// # Errors
/// Returns `SetupError::ParseError` if the rows are ragged.
pub fn from_rows(rows: &[Vec<f64>]) -> Result<DenseMatrix, SetupError> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != ncols) {
        return Err(SetupError::ParseError(format!(
            "row {} has {} columns, expected {}",
            i + 1,
            row.len(),
            ncols
        )));
    }
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DenseMatrix::from_row_slice(rows.len(), ncols, &data))
}

/// Reads a whitespace-separated numeric matrix, one row per line. Blank lines and lines
/// starting with `#` are ignored. A file with a single row of values is read as a 1×n matrix.
///
/// # Errors
/// Returns an I/O error if the file cannot be read and `SetupError::ParseError` if a token is
/// not a number or the rows have differing lengths.
pub fn load_txt(path: &Path) -> Result<DenseMatrix, SetupError> {
    let text = fs::read_to_string(path)?;
    parse_txt(&text).map_err(|e| match e {
        SetupError::ParseError(msg) => SetupError::ParseError(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Parses the text form read by [`load_txt`].
///
/// # Errors
/// Returns `SetupError::ParseError` on a non-numeric token or ragged rows.
pub fn parse_txt(text: &str) -> Result<DenseMatrix, SetupError> {
    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    SetupError::ParseError(format!(
                        "invalid number '{token}' on line {}",
                        line_no + 1
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    from_rows(&rows)
}

/// Iterates over the non-zero entries as `(row, column, value)` in row-major order.
pub fn nonzero_entries(matrix: &DenseMatrix) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
    matrix.row_iter().enumerate().flat_map(|(i, row)| {
        row.iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(move |(j, v)| (i, j, *v))
            .collect::<Vec<_>>()
    })
}

/// Returns every non-zero entry `(i, j, v)` with `v > threshold(i)`. The threshold is per row
/// so the caller can compare each row against its own bound.
pub fn find_above<'a, F>(
    matrix: &'a DenseMatrix,
    threshold: F,
) -> impl Iterator<Item = (usize, usize, f64)> + 'a
where
    F: Fn(usize) -> f64 + 'a,
{
    nonzero_entries(matrix).filter(move |&(i, _, v)| v > threshold(i))
}
