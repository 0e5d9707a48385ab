use std::path::PathBuf;
use std::time::Duration;

/// A convergence check: squared L2 difference between successive iterates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormCheck {
    pub iteration: usize,
    pub norm2: f64,
}

/// What a finished run reports.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub nx: usize,
    pub ny: usize,
    pub iterations: usize,
    pub converged: bool,
    pub center: (usize, usize),
    pub center_value: f64,
    /// Mean over interior cells.
    pub mean: f64,
    pub norm_history: Vec<NormCheck>,
    pub elapsed: Duration,
    /// Files written during the run, in completion order.
    pub files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn lines(&self) -> Vec<String> {
        let (i, j) = self.center;
        vec![
            format!("u[{},{}] = {:.6}", i, j, self.center_value),
            format!("Mean u = {:.6}", self.mean),
            format!("Time spent: {:.3} s", self.elapsed.as_secs_f64()),
        ]
    }

    pub fn print(&self) {
        for line in self.lines() {
            println!("{}", line);
        }
    }

    /// True when the last convergence check is no larger than the first.
    pub fn norms_trend_down(&self) -> bool {
        match (self.norm_history.first(), self.norm_history.last()) {
            (Some(first), Some(last)) => last.norm2 <= first.norm2,
            _ => true,
        }
    }
}
