//! Pixel grid: the rows × cols picture shown on the mesh.

use std::fmt;

use thiserror::Error;

/// Errors raised when addressing a cell outside the grid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// One pixel color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The three channel bytes in wire order.
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// A cell of the grid, addressed by row then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

impl GridPosition {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A rows × cols matrix of [`Rgb`] cells stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Rgb>,
}

impl PixelGrid {
    /// Creates an all-black grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, Rgb::BLACK)
    }

    /// Creates a grid with every cell set to `color`.
    pub fn filled(rows: usize, cols: usize, color: Rgb) -> Self {
        Self {
            rows,
            cols,
            cells: vec![color; rows * cols],
        }
    }

    /// Builds a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Rgb) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(row, col));
            }
        }
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, pos: GridPosition) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Returns the color at `pos`, or `None` when it lies outside the grid.
    pub fn get(&self, pos: GridPosition) -> Option<Rgb> {
        if self.contains(pos) {
            Some(self.cells[pos.row * self.cols + pos.col])
        } else {
            None
        }
    }

    /// Sets the color at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `pos` lies outside the grid.
    pub fn set(&mut self, pos: GridPosition, color: Rgb) -> Result<(), GridError> {
        if !self.contains(pos) {
            return Err(GridError::OutOfBounds {
                row: pos.row,
                col: pos.col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        self.cells[pos.row * self.cols + pos.col] = color;
        Ok(())
    }

    /// Sets every cell to `color`.
    pub fn fill(&mut self, color: Rgb) {
        self.cells.fill(color);
    }
}
