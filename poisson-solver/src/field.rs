use crate::error::{Result, SolverError};
use crate::grid::Grid;
use crate::stencil::{self, ExecutionMode};
use ndarray::{Array2, Zip};

/// Scalar field on a [`Grid`], stored row-major with shape `(ny, nx)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    data: Array2<f64>,
}

impl Field {
    pub fn zeros(grid: &Grid) -> Self {
        Field {
            data: Array2::zeros(grid.shape()),
        }
    }

    /// Gaussian-modulated cosine centred on the grid, used as the source term.
    pub fn gaussian_source(grid: &Grid, mode: ExecutionMode) -> Self {
        let nx = grid.nx as f64;
        let ny = grid.ny as f64;
        let cx = nx / 2.0;
        let cy = ny / 2.0;
        let sigma2 = 0.05 * nx * ny; // Width of the Gaussian
        let kx = 20.0 / nx; // Spatial frequency in x
        let ky = 10.0 / ny; // Spatial frequency in y

        let mut data = Array2::<f64>::zeros(grid.shape());
        let zip = Zip::indexed(&mut data);
        let init = |(i, j): (usize, usize), value: &mut f64| {
            let dx = j as f64 - cx;
            let dy = i as f64 - cy;
            let r2 = dx * dx + dy * dy;
            *value = (kx * dx + ky * dy).cos() * (-r2 / sigma2).exp();
        };
        match mode {
            ExecutionMode::Parallel => zip.par_for_each(init),
            ExecutionMode::Serial => zip.for_each(init),
        }

        Field { data }
    }

    pub fn from_fn(grid: &Grid, f: impl Fn(usize, usize) -> f64) -> Self {
        Field {
            data: Array2::from_shape_fn(grid.shape(), |(i, j)| f(i, j)),
        }
    }

    /// Rebuild a field from row-major values.
    pub fn from_row_major(nx: usize, ny: usize, values: Vec<f64>) -> Result<Self> {
        let len = values.len();
        Array2::from_shape_vec((ny, nx), values)
            .map(|data| Field { data })
            .map_err(|_| {
                SolverError::Format(format!(
                    "{} values do not fill a {}x{} field",
                    len, nx, ny
                ))
            })
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    /// `(nx, ny)`.
    pub fn dims(&self) -> (usize, usize) {
        let (ny, nx) = self.data.dim();
        (nx, ny)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data.get((i, j)).copied()
    }

    /// Values in row-major order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    /// Mean over interior cells; zero when the grid has no interior.
    pub fn interior_mean(&self, mode: ExecutionMode) -> f64 {
        let (nx, ny) = self.dims();
        if nx < 3 || ny < 3 {
            return 0.0;
        }
        stencil::interior_sum(&self.data, mode) / ((nx - 2) * (ny - 2)) as f64
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().map(|&v| v.abs()).fold(0.0_f64, f64::max)
    }

    pub fn boundary_is_zero(&self) -> bool {
        let (ny, nx) = self.data.dim();
        self.data
            .indexed_iter()
            .filter(|&((i, j), _)| i == 0 || j == 0 || i + 1 == ny || j + 1 == nx)
            .all(|(_, &v)| v == 0.0)
    }

    /// Explicit copy of the field, detached from the buffer the solver keeps mutating.
    pub fn snapshot(&self, iteration: usize) -> Snapshot {
        let (nx, ny) = self.dims();
        Snapshot {
            iteration,
            nx,
            ny,
            values: self.values().collect(),
        }
    }
}

/// Owned, immutable copy of a field at a given iteration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub iteration: usize,
    pub nx: usize,
    pub ny: usize,
    values: Vec<f64>,
}

impl Snapshot {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_field(self) -> Result<Field> {
        Field::from_row_major(self.nx, self.ny, self.values)
    }
}
