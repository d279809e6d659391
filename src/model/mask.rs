//! Binary segmentation masks at their own resolution.
//!
//! A mask is generated by the segmentation model at whatever resolution the
//! model works in. It is never resampled here; the compositor stretches it
//! over the image footprint at draw time.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A grid of 0/1 cells, `height` rows by `width` columns.
///
/// On the wire a mask is `number[][]` or `boolean[][]` in row-major order.
/// Any non-zero or `true` value counts as set. Ragged rows produce an empty mask rather than an error so
/// that a bad model response simply draws nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<WireCell>>", into = "Vec<Vec<u8>>")]
pub struct Mask {
    grid: Array2<u8>,
}

impl Mask {
    /// A mask with no cells.
    pub fn empty() -> Self {
        Self {
            grid: Array2::zeros((0, 0)),
        }
    }

    /// A mask with all cells cleared.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            grid: Array2::zeros((height, width)),
        }
    }

    /// Wrap an existing grid (rows = height).
    pub fn from_array(grid: Array2<u8>) -> Self {
        let grid = grid.mapv(|v| u8::from(v != 0));
        Self { grid }
    }

    /// Build from row-major nested rows. Ragged input yields an empty mask.
    pub fn from_rows<T>(rows: &[Vec<T>]) -> Self
    where
        T: Copy + Into<f64>,
    {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Self::empty();
        }
        if let Some(bad) = rows.iter().position(|row| row.len() != width) {
            log::warn!(
                "Malformed mask: row {} has {} columns, expected {}",
                bad,
                rows[bad].len(),
                width
            );
            return Self::empty();
        }

        let flat: Vec<u8> = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| u8::from(v.into() != 0.0)))
            .collect();

        match Array2::from_shape_vec((height, width), flat) {
            Ok(grid) => Self { grid },
            Err(e) => {
                log::warn!("Malformed mask {}x{}: {}", width, height, e);
                Self::empty()
            }
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.grid.ncols()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.grid.nrows()
    }

    /// True if the mask has zero rows or zero columns.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether cell `(x, y)` is set. Out of range cells are not set.
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.grid.get((y, x)).is_some_and(|&v| v != 0)
    }

    /// Set or clear cell `(x, y)`. Out of range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if let Some(cell) = self.grid.get_mut((y, x)) {
            *cell = u8::from(value);
        }
    }

    /// Number of set cells.
    pub fn count_set(&self) -> usize {
        self.grid.iter().filter(|&&v| v != 0).count()
    }

    /// At least one cell is set.
    pub fn has_coverage(&self) -> bool {
        self.grid.iter().any(|&v| v != 0)
    }

    pub fn grid(&self) -> &Array2<u8> {
        &self.grid
    }

    /// Row-major nested rows, the shape the model service expects for a prior mask.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.grid.rows().into_iter().map(|row| row.to_vec()).collect()
    }
}

impl Default for Mask {
    fn default() -> Self {
        Self::empty()
    }
}

/// One wire cell: models send either numbers or booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum WireCell {
    Num(f64),
    Bool(bool),
}

impl From<WireCell> for f64 {
    fn from(cell: WireCell) -> Self {
        match cell {
            WireCell::Num(v) => v,
            WireCell::Bool(b) => f64::from(u8::from(b)),
        }
    }
}

impl From<Vec<Vec<WireCell>>> for Mask {
    fn from(rows: Vec<Vec<WireCell>>) -> Self {
        Self::from_rows(&rows)
    }
}

impl From<Mask> for Vec<Vec<u8>> {
    fn from(mask: Mask) -> Self {
        mask.to_rows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_dimensions() {
        let mask = Mask::from_rows(&[vec![0u8, 0, 1, 0], vec![0, 0, 0, 0], vec![1, 0, 0, 0]]);
        assert_eq!(mask.width(), 4);
        assert_eq!(mask.height(), 3);
        assert!(mask.is_set(2, 0));
        assert!(mask.is_set(0, 2));
        assert!(!mask.is_set(3, 2));
        assert_eq!(mask.count_set(), 2);
    }

    #[test]
    fn test_ragged_rows_give_empty_mask() {
        let mask = Mask::from_rows(&[vec![1u8, 1], vec![1]]);
        assert!(mask.is_empty());
        assert!(!mask.has_coverage());
    }

    #[test]
    fn test_zero_columns_is_empty() {
        let mask = Mask::from_rows::<u8>(&[vec![], vec![]]);
        assert!(mask.is_empty());
        assert!(Mask::from_rows::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_out_of_range_cells() {
        let mut mask = Mask::zeros(2, 2);
        mask.set(5, 5, true);
        assert!(!mask.is_set(5, 5));
        assert!(!mask.has_coverage());
    }

    #[test]
    fn test_non_binary_values_count_as_set() {
        let mask = Mask::from_array(ndarray::array![[0u8, 255], [3, 0]]);
        assert_eq!(mask.to_rows(), vec![vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_deserialize_wire_mask() {
        let mask: Mask = serde_json::from_str("[[0, 1], [1, 1], [0, 0]]").unwrap();
        assert_eq!(mask.width(), 2);
        assert_eq!(mask.height(), 3);
        assert_eq!(mask.count_set(), 3);

        let ragged: Mask = serde_json::from_str("[[0, 1], [1]]").unwrap();
        assert!(ragged.is_empty());

        let flags: Mask = serde_json::from_str("[[true, false], [false, true]]").unwrap();
        assert_eq!(flags.width(), 2);
        assert!(flags.is_set(0, 0));
        assert!(!flags.is_set(1, 0));
        assert!(flags.is_set(1, 1));
        assert_eq!(flags.count_set(), 2);
    }
}
