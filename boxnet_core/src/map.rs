use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{Direction, Position};

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Coordinates ({row}, {col}) are out of bounds for a {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
/// Cells are addressed by [`Position`] (`row`, `col`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn new(rows: usize, cols: usize) -> Self
    where
        T: Default + Clone,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        Grid {
            rows,
            cols,
            cells: vec![T::default(); size],
        }
    }

    /// Creates a new grid filled by a generator function called with each cell's position.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn from_generator<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(Position::new(row, col)));
            }
        }
        Grid { rows, cols, cells }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn index_of(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            Some(position.row * self.cols + position.col)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        position.row < self.rows && position.col < self.cols
    }

    /// Returns `Ok(())` if `position` is in range, the bounds error otherwise.
    pub fn check(&self, position: Position) -> Result<(), GridError> {
        if self.contains(position) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                row: position.row,
                col: position.col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// The in-range neighbour of `position` in `direction`.
    pub fn step(&self, position: Position, direction: Direction) -> Option<Position> {
        position.step(direction).filter(|next| self.contains(*next))
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        self.cells.get(self.index_of(position)?)
    }

    pub fn get_mut(&mut self, position: Position) -> Option<&mut T> {
        let index = self.index_of(position)?;
        self.cells.get_mut(index)
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (Position::new(index / cols, index % cols), cell))
    }
}

/// Indexing using Position coordinates for access
impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, position: Position) -> &Self::Output {
        match self.index_of(position) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for a {}x{} grid",
                position, self.rows, self.cols
            ),
        }
    }
}

/// Indexing using Position coordinates for mutable access
impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, position: Position) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.index_of(position) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index {} out of bounds for a {}x{} grid",
                position, rows, cols
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_enumeration() {
        let grid = Grid::from_generator(2, 3, |p| p.row * 10 + p.col);
        let values: Vec<usize> = grid.enumerate().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 1, 2, 10, 11, 12]);
        assert_eq!(grid[Position::new(1, 2)], 12);
    }

    #[test]
    fn test_step_respects_both_bounds() {
        let grid: Grid<u8> = Grid::new(2, 4);
        assert_eq!(grid.step(Position::new(0, 0), Direction::Up), None);
        assert_eq!(grid.step(Position::new(1, 0), Direction::Down), None);
        assert_eq!(grid.step(Position::new(0, 3), Direction::Right), None);
        assert_eq!(
            grid.step(Position::new(0, 3), Direction::Down),
            Some(Position::new(1, 3))
        );
    }

    #[test]
    fn test_check_reports_dimensions() {
        let grid: Grid<u8> = Grid::new(2, 4);
        assert_eq!(
            grid.check(Position::new(2, 0)),
            Err(GridError::OutOfBounds {
                row: 2,
                col: 0,
                rows: 2,
                cols: 4
            })
        );
        assert!(grid.check(Position::new(1, 3)).is_ok());
    }
}
