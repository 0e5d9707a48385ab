use crate::error::{Result, SolverError};

/// Regular 2D grid. Rows run along `i` (`ny` of them), columns along `j` (`nx`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nx: usize, // Number of columns
    pub ny: usize, // Number of rows
    pub h2: f64,   // Grid spacing squared
}

impl Grid {
    pub fn new(nx: usize, ny: usize, h2: f64) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(SolverError::InvalidConfig(format!(
                "Grid dimensions must be positive (nx={}, ny={})",
                nx, ny
            )));
        }
        if !(h2 > 0.0) || !h2.is_finite() {
            return Err(SolverError::InvalidConfig(format!(
                "Grid spacing squared must be positive, got {}",
                h2
            )));
        }
        let fits = nx
            .checked_mul(ny)
            .is_some_and(|cells| cells <= isize::MAX as usize / std::mem::size_of::<f64>());
        if !fits {
            return Err(SolverError::InvalidConfig(format!(
                "Grid of {}x{} cells is too large to allocate",
                nx, ny
            )));
        }
        Ok(Grid { nx, ny, h2 })
    }

    /// Square grid with unit spacing.
    pub fn square(n: usize) -> Result<Self> {
        Self::new(n, n, 1.0)
    }

    pub fn n_cells(&self) -> usize {
        self.nx * self.ny
    }

    /// Shape as ndarray expects it: (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.ny, self.nx)
    }

    pub fn has_interior(&self) -> bool {
        self.nx >= 3 && self.ny >= 3
    }

    pub fn interior_cells(&self) -> usize {
        if self.has_interior() {
            (self.nx - 2) * (self.ny - 2)
        } else {
            0
        }
    }

    /// The cell reported at the end of a run.
    pub fn center(&self) -> (usize, usize) {
        (self.ny / 2, self.nx / 2)
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(self.in_bounds(i, j));
        i * self.nx + j
    }

    pub fn in_bounds(&self, i: usize, j: usize) -> bool {
        i < self.ny && j < self.nx
    }

    pub fn is_boundary(&self, i: usize, j: usize) -> bool {
        i == 0 || j == 0 || i + 1 == self.ny || j + 1 == self.nx
    }
}
