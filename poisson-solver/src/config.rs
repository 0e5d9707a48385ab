use crate::error::{Result, SolverError};
use crate::grid::Grid;
use crate::stencil::ExecutionMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_h2")]
    pub h2: f64,
}

fn default_size() -> usize {
    1024
}

fn default_h2() -> f64 {
    1.0
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            size: default_size(),
            h2: default_h2(),
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(invalid("Size needs to be greater than zero."));
        }
        if !(self.h2 > 0.0) || !self.h2.is_finite() {
            return Err(SolverError::InvalidConfig(format!(
                "h2 must be positive, got {}",
                self.h2
            )));
        }
        Grid::new(self.size, self.size, self.h2)?;
        Ok(())
    }
}

/// Iteration and convergence policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Stop once the L2 difference between iterates drops below this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm_threshold: Option<f64>,
    #[serde(default = "default_check_interval")]
    pub check_interval: usize,
    /// Zero disables periodic checkpoints.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

fn default_iterations() -> usize {
    500
}

fn default_repetitions() -> usize {
    1
}

fn default_check_interval() -> usize {
    100
}

fn default_checkpoint_interval() -> usize {
    1000
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: default_iterations(),
            repetitions: default_repetitions(),
            norm_threshold: None,
            check_interval: default_check_interval(),
            checkpoint_interval: default_checkpoint_interval(),
            mode: ExecutionMode::default(),
            threads: None,
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(invalid("Number of iterations need to be greater than zero."));
        }
        if self.repetitions == 0 {
            return Err(invalid("Number of repetitions need to be greater than zero."));
        }
        if let Some(threshold) = self.norm_threshold {
            if !(threshold > 0.0) || !threshold.is_finite() {
                return Err(invalid("Max norm need to be greater than zero."));
            }
            if self.check_interval == 0 {
                return Err(invalid(
                    "check_interval must be positive when a norm threshold is set",
                ));
            }
        }
        if self.threads == Some(0) {
            return Err(invalid("threads must be positive"));
        }
        Ok(())
    }
}

/// File output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Write checkpoint files at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Render the final field to PNG.
    #[serde(default)]
    pub plot: bool,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_enabled() -> bool {
    true
}

fn default_image_size() -> u32 {
    1000
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: default_output_dir(),
            enabled: default_enabled(),
            plot: false,
            image_size: default_image_size(),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.plot && self.image_size == 0 {
            return Err(invalid("image_size must be positive"));
        }
        Ok(())
    }
}

/// Complete solver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Values given on the command line. Signed so that non-positive input can
/// be reported instead of failing to parse.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub grid_size: Option<i64>,
    pub iterations: Option<i64>,
    pub repetitions: Option<i64>,
    pub norm_threshold: Option<f64>,
    pub check_interval: Option<usize>,
    pub checkpoint_interval: Option<usize>,
    pub mode: Option<ExecutionMode>,
    pub threads: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub no_output: bool,
    pub plot: bool,
}

impl SolverConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SolverError::io(path, e))?;
        let config = Self::from_toml(&content)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SolverConfig = toml::from_str(content).map_err(|e| {
            SolverError::InvalidConfig(format!("Failed to parse TOML config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line values on top of this configuration and re-validate.
    pub fn apply(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(n) = overrides.grid_size {
            self.grid.size = positive(n, "Size needs to be greater than zero.")?;
        }
        if let Some(n) = overrides.iterations {
            self.run.iterations =
                positive(n, "Number of iterations need to be greater than zero.")?;
        }
        if let Some(n) = overrides.repetitions {
            self.run.repetitions =
                positive(n, "Number of repetitions need to be greater than zero.")?;
        }
        if overrides.norm_threshold.is_some() {
            self.run.norm_threshold = overrides.norm_threshold;
        }
        if let Some(k) = overrides.check_interval {
            self.run.check_interval = k;
        }
        if let Some(m) = overrides.checkpoint_interval {
            self.run.checkpoint_interval = m;
        }
        if let Some(mode) = overrides.mode {
            self.run.mode = mode;
        }
        if overrides.threads.is_some() {
            self.run.threads = overrides.threads;
        }
        if let Some(dir) = &overrides.output_dir {
            self.output.dir = dir.clone();
        }
        if overrides.no_output {
            self.output.enabled = false;
        }
        if overrides.plot {
            self.output.plot = true;
        }
        self.validate()
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.run.validate()?;
        self.output.validate()?;
        Ok(())
    }

    pub fn grid(&self) -> Result<Grid> {
        Grid::new(self.grid.size, self.grid.size, self.grid.h2)
    }

    /// Where checkpoints go, or `None` when file output is off.
    pub fn output_dir(&self) -> Option<&Path> {
        self.output.enabled.then_some(self.output.dir.as_path())
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        info!("=== Solver Configuration ===");
        info!(
            "Grid: {}x{} (h2={})",
            self.grid.size, self.grid.size, self.grid.h2
        );
        info!(
            "Run: iterations={}, repetitions={}, mode={:?}",
            self.run.iterations, self.run.repetitions, self.run.mode
        );
        match self.run.norm_threshold {
            Some(threshold) => info!(
                "Convergence: threshold={} checked every {} iterations",
                threshold, self.run.check_interval
            ),
            None => info!("Convergence: fixed iteration count"),
        }
        match self.output_dir() {
            Some(dir) if self.run.checkpoint_interval > 0 => info!(
                "Output: {} (checkpoint every {} iterations)",
                dir.display(),
                self.run.checkpoint_interval
            ),
            Some(dir) => info!("Output: {} (no periodic checkpoints)", dir.display()),
            None => info!("Output: disabled"),
        }
        info!("============================");
    }
}

fn invalid(msg: &str) -> SolverError {
    SolverError::InvalidConfig(msg.to_string())
}

/// Integer prefix of `s`, read the way C's `atoi` does: leading whitespace,
/// an optional sign, then digits. Anything else yields 0.
pub fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Floating-point prefix of `s`, read the way C's `atof` does. Yields 0.0
/// when no prefix parses.
pub fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    (1..=end)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn positive(value: i64, msg: &str) -> Result<usize> {
    if value < 1 {
        return Err(invalid(msg));
    }
    usize::try_from(value).map_err(|_| invalid(msg))
}
