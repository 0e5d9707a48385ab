use crate::checkpoint::{CheckpointWriter, FINAL_FILE, SOURCE_FILE};
use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::field::Field;
use crate::grid::Grid;
use crate::report::{NormCheck, RunSummary};
use crate::stencil::{self, ExecutionMode};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SolverParams {
    pub iterations: usize,             // Upper bound on Jacobi sweeps
    pub norm_threshold: Option<f64>,   // Early-exit threshold on the L2 difference
    pub check_interval: usize,         // Sweeps between convergence checks
    pub checkpoint_interval: usize,    // Sweeps between checkpoints, 0 = never
    pub mode: ExecutionMode,
    pub output_dir: Option<PathBuf>,
}

impl SolverParams {
    /// Fixed iteration count, no file output.
    pub fn fixed(iterations: usize) -> Self {
        Self {
            iterations,
            norm_threshold: None,
            check_interval: 100,
            checkpoint_interval: 0,
            mode: ExecutionMode::Parallel,
            output_dir: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64, check_interval: usize) -> Self {
        self.norm_threshold = Some(threshold);
        self.check_interval = check_interval;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output(mut self, dir: impl Into<PathBuf>, checkpoint_interval: usize) -> Self {
        self.output_dir = Some(dir.into());
        self.checkpoint_interval = checkpoint_interval;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(SolverError::InvalidConfig(
                "Number of iterations need to be greater than zero.".into(),
            ));
        }
        if let Some(threshold) = self.norm_threshold {
            if !(threshold > 0.0) || !threshold.is_finite() {
                return Err(SolverError::InvalidConfig(
                    "Max norm need to be greater than zero.".into(),
                ));
            }
            if self.check_interval == 0 {
                return Err(SolverError::InvalidConfig(
                    "check_interval must be positive when a norm threshold is set".into(),
                ));
            }
        }
        Ok(())
    }

    fn is_check_iteration(&self, iteration: usize) -> bool {
        self.norm_threshold.is_some() && iteration % self.check_interval == 0
    }

    fn is_checkpoint_iteration(&self, iteration: usize) -> bool {
        self.checkpoint_interval > 0 && iteration % self.checkpoint_interval == 0
    }
}

impl From<&SolverConfig> for SolverParams {
    fn from(config: &SolverConfig) -> Self {
        Self {
            iterations: config.run.iterations,
            norm_threshold: config.run.norm_threshold,
            check_interval: config.run.check_interval,
            checkpoint_interval: config.run.checkpoint_interval,
            mode: config.run.mode,
            output_dir: config.output_dir().map(PathBuf::from),
        }
    }
}

/// Jacobi relaxation of `∇²u = f` with zero boundary values.
pub struct Solver {
    pub grid: Grid,
    pub params: SolverParams,
    source: Field,
    u: Field,
    unew: Field,
    iteration: usize,
    converged: bool,
    norm_history: Vec<NormCheck>,
}

impl Solver {
    /// Validates, then allocates the three fields and fills the Gaussian source.
    pub fn new(grid: Grid, params: SolverParams) -> Result<Self> {
        params.validate()?;
        let source = Field::gaussian_source(&grid, params.mode);
        Self::build(grid, source, params)
    }

    /// Same as [`Solver::new`] with a caller-supplied source term.
    pub fn with_source(grid: Grid, source: Field, params: SolverParams) -> Result<Self> {
        params.validate()?;
        if source.dims() != (grid.nx, grid.ny) {
            return Err(SolverError::Format(format!(
                "source is {:?} but the grid is {}x{}",
                source.dims(),
                grid.nx,
                grid.ny
            )));
        }
        Self::build(grid, source, params)
    }

    fn build(grid: Grid, source: Field, params: SolverParams) -> Result<Self> {
        Ok(Self {
            u: Field::zeros(&grid),
            unew: Field::zeros(&grid),
            source,
            grid,
            params,
            iteration: 0,
            converged: false,
            norm_history: Vec::new(),
        })
    }

    pub fn source(&self) -> &Field {
        &self.source
    }

    /// Latest iterate.
    pub fn current(&self) -> &Field {
        &self.u
    }

    /// Iterate before the latest one.
    pub fn previous(&self) -> &Field {
        &self.unew
    }

    pub fn into_field(self) -> Field {
        self.u
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn norm_history(&self) -> &[NormCheck] {
        &self.norm_history
    }

    pub fn is_finished(&self) -> bool {
        self.converged || self.iteration >= self.params.iterations
    }

    /// One Jacobi sweep followed by the buffer swap.
    pub fn step(&mut self) {
        stencil::jacobi_update(
            self.u.as_array(),
            self.source.as_array(),
            self.unew.as_array_mut(),
            self.grid.h2,
            self.params.mode,
        );
        std::mem::swap(&mut self.u, &mut self.unew);
        self.iteration += 1;
    }

    /// Squared L2 difference between the last two iterates.
    pub fn diff_norm2(&self) -> f64 {
        stencil::diff_norm2(self.u.as_array(), self.unew.as_array(), self.params.mode)
    }

    /// Runs the convergence check if this iteration is due one.
    /// Returns `true` once the run has converged.
    fn check_convergence(&mut self) -> bool {
        let Some(threshold) = self.params.norm_threshold else {
            return false;
        };
        if !self.params.is_check_iteration(self.iteration) {
            return false;
        }

        let norm2 = self.diff_norm2();
        println!("{:06}: {:.6}", self.iteration, norm2);
        self.norm_history.push(NormCheck {
            iteration: self.iteration,
            norm2,
        });

        if norm2 < threshold * threshold {
            println!("Converged");
            self.converged = true;
        }
        self.converged
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        debug!(
            "Starting Jacobi iteration on {}x{} grid, {} sweeps max",
            self.grid.nx, self.grid.ny, self.params.iterations
        );

        let mut writer = match &self.params.output_dir {
            Some(dir) => {
                let mut writer = CheckpointWriter::new(dir)?;
                writer.write_now(SOURCE_FILE, &self.source)?;
                writer.submit(self.u.snapshot(self.iteration))?;
                Some(writer)
            }
            None => None,
        };

        let start = Instant::now();

        while !self.is_finished() {
            self.step();

            if self.check_convergence() {
                break;
            }

            if self.params.is_checkpoint_iteration(self.iteration) {
                if let Some(writer) = writer.as_mut() {
                    // The sweep above has returned, so `u` is stable; the copy
                    // travels to the writer while the next sweeps run.
                    writer.submit(self.u.snapshot(self.iteration))?;
                    info!("Checkpoint {:06} submitted", self.iteration);
                }
            }
        }

        if let Some(writer) = writer.as_mut() {
            writer.wait()?;
        }
        let elapsed = start.elapsed();

        let checkpoints = match writer {
            Some(mut writer) => {
                writer.write_now(FINAL_FILE, &self.u)?;
                writer.finish()?
            }
            None => Vec::new(),
        };

        let center = self.grid.center();
        let center_value = self.u.get(center.0, center.1).unwrap_or(0.0);

        Ok(RunSummary {
            nx: self.grid.nx,
            ny: self.grid.ny,
            iterations: self.iteration,
            converged: self.converged,
            center,
            center_value,
            mean: self.u.interior_mean(self.params.mode),
            norm_history: self.norm_history.clone(),
            elapsed,
            files: checkpoints,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(n: usize) -> Grid {
        Grid::square(n).unwrap()
    }

    #[test]
    fn zero_source_is_a_fixed_point() {
        let grid = small(4);
        let mut solver =
            Solver::with_source(grid, Field::zeros(&grid), SolverParams::fixed(1)).unwrap();
        let summary = solver.run().unwrap();

        assert_eq!(summary.iterations, 1);
        assert!(solver.current().values().all(|v| v == 0.0));
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.center_value, 0.0);
    }

    #[test]
    fn step_swaps_buffers() {
        let grid = small(5);
        let mut solver = Solver::new(grid, SolverParams::fixed(10)).unwrap();
        solver.step();
        let first = solver.current().clone();
        assert!(solver.previous().values().all(|v| v == 0.0));

        solver.step();
        assert_eq!(solver.previous(), &first);
        assert_eq!(solver.iteration(), 2);
    }

    #[test]
    fn step_reproduces_update_from_frozen_input() {
        let grid = small(9);
        let mut solver = Solver::new(grid, SolverParams::fixed(10)).unwrap();
        for _ in 0..3 {
            solver.step();
        }
        let frozen = solver.current().as_array().clone();
        let mut expected = ndarray::Array2::zeros(grid.shape());
        stencil::jacobi_update(
            &frozen,
            solver.source().as_array(),
            &mut expected,
            grid.h2,
            ExecutionMode::Serial,
        );

        solver.step();
        assert_eq!(solver.current().as_array(), &expected);
    }

    #[test]
    fn rejects_zero_iterations_before_allocating() {
        let err = Solver::new(small(8), SolverParams::fixed(0)).err().unwrap();
        assert!(err.is_config());
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let params = SolverParams::fixed(10).with_threshold(0.0, 100);
        assert!(Solver::new(small(8), params).err().unwrap().is_config());
    }

    #[test]
    fn rejects_mismatched_source() {
        let err = Solver::with_source(small(4), Field::zeros(&small(5)), SolverParams::fixed(1))
            .err()
            .unwrap();
        assert!(matches!(err, SolverError::Format(_)));
    }

    #[test]
    fn huge_threshold_converges_at_first_check() {
        let params = SolverParams::fixed(1000).with_threshold(1e6, 100);
        let mut solver = Solver::new(small(16), params).unwrap();
        let summary = solver.run().unwrap();

        assert!(summary.converged);
        assert_eq!(summary.iterations, 100);
        assert_eq!(summary.norm_history.len(), 1);
        assert_eq!(summary.norm_history[0].iteration, 100);
    }

    #[test]
    fn tiny_threshold_runs_to_the_limit() {
        let params = SolverParams::fixed(350).with_threshold(1e-300, 100);
        let mut solver = Solver::new(small(16), params).unwrap();
        let summary = solver.run().unwrap();

        assert!(!summary.converged);
        assert_eq!(summary.iterations, 350);
        let checked: Vec<_> = summary.norm_history.iter().map(|c| c.iteration).collect();
        assert_eq!(checked, vec![100, 200, 300]);
    }

    #[test]
    fn summary_reports_center_and_interior_mean() {
        let mut solver = Solver::new(small(12), SolverParams::fixed(20)).unwrap();
        let summary = solver.run().unwrap();

        assert_eq!(summary.center, (6, 6));
        assert_eq!(Some(summary.center_value), solver.current().get(6, 6));
        let expected = solver.current().interior_mean(ExecutionMode::Serial);
        assert!((summary.mean - expected).abs() < 1e-12);
        assert!(summary.files.is_empty());
    }
}
