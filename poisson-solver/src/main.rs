use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use poisson_solver::config::{leading_float, leading_int};
use poisson_solver::visualisation::FieldVisualiser;
use poisson_solver::{
    checkpoint, compare, ExecutionMode, Overrides, Solver, SolverConfig, SolverError,
    SolverParams,
};
use std::convert::Infallible;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Jacobi solver for the 2D Poisson equation
#[derive(Parser)]
#[command(name = "poisson-solver")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Jacobi iteration for the 2D Poisson equation", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two field dumps
    Compare {
        file1: PathBuf,
        file2: PathBuf,
    },
    /// Render a field dump to PNG
    Render {
        file: PathBuf,
        /// Output image (defaults to the dump name with a .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "1000")]
        size: u32,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Grid points per axis [default: 1024]
    #[arg(allow_negative_numbers = true, value_parser = int_arg)]
    grid_size: Option<i64>,

    /// Maximum number of Jacobi sweeps [default: 500]
    #[arg(allow_negative_numbers = true, value_parser = int_arg)]
    iterations: Option<i64>,

    /// Number of independent runs [default: 1]
    #[arg(allow_negative_numbers = true, value_parser = int_arg)]
    repetitions: Option<i64>,

    /// Stop once the L2 difference between sweeps drops below this
    #[arg(allow_negative_numbers = true, value_parser = float_arg)]
    norm_threshold: Option<f64>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for checkpoints
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not write any files
    #[arg(long)]
    no_output: bool,

    /// Run every kernel on the calling thread
    #[arg(long)]
    serial: bool,

    /// Size of the worker pool
    #[arg(long)]
    threads: Option<usize>,

    /// Sweeps between convergence checks
    #[arg(long)]
    check_interval: Option<usize>,

    /// Sweeps between checkpoints (0 disables)
    #[arg(long)]
    checkpoint_interval: Option<usize>,

    /// Render the final field to PNG
    #[arg(long)]
    plot: bool,
}

// Positionals never fail to parse: malformed numbers read as their numeric
// prefix (often 0) and are rejected by config validation with exit status 1.
fn int_arg(s: &str) -> Result<i64, Infallible> {
    Ok(leading_int(s))
}

fn float_arg(s: &str) -> Result<f64, Infallible> {
    Ok(leading_float(s))
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            grid_size: self.grid_size,
            iterations: self.iterations,
            repetitions: self.repetitions,
            norm_threshold: self.norm_threshold,
            check_interval: self.check_interval,
            checkpoint_interval: self.checkpoint_interval,
            mode: self.serial.then_some(ExecutionMode::Serial),
            threads: self.threads,
            output_dir: self.output.clone(),
            no_output: self.no_output,
            plot: self.plot,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(err) = dispatch(cli) {
        match err.downcast_ref::<SolverError>() {
            Some(e) if e.is_config() => println!("{}", e),
            _ => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {}", e);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Compare { file1, file2 }) => run_compare(&file1, &file2),
        Some(Commands::Render { file, output, size }) => run_render(&file, output, size),
        None => run_solver(&cli.run),
    }
}

fn run_solver(args: &RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_file(path)?,
        None => SolverConfig::default(),
    };
    config.apply(&args.overrides())?;

    if let Some(threads) = config.run.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to size the worker pool")?;
    }
    info!("Worker threads: {}", rayon::current_num_threads());
    config.print_summary();

    let grid = config.grid()?;
    for rep in 0..config.run.repetitions {
        println!("RUN {}", rep);
        println!(
            "Using n = {}, niter = {}",
            config.grid.size, config.run.iterations
        );

        let mut solver = Solver::new(grid, SolverParams::from(&config))?;
        let summary = solver
            .run()
            .with_context(|| format!("Run {} failed", rep))?;
        summary.print();
        if config.run.norm_threshold.is_some() && !summary.norms_trend_down() {
            warn!("Convergence norm grew over the run");
        }

        if config.output.plot {
            let size = config.output.image_size;
            let visualiser = FieldVisualiser::new(&config.output.dir, size, size)?;
            visualiser.plot_field(solver.current(), summary.iterations, "u")?;
        }

        std::io::stdout().flush().context("Failed to flush stdout")?;
    }
    Ok(())
}

fn run_compare(file1: &Path, file2: &Path) -> Result<()> {
    let cmp = compare::compare_files(file1, file2).with_context(|| {
        format!(
            "Failed to compare '{}' with '{}'",
            file1.display(),
            file2.display()
        )
    })?;
    for line in cmp.lines() {
        println!("{}", line);
    }
    Ok(())
}

fn run_render(file: &Path, output: Option<PathBuf>, size: u32) -> Result<()> {
    if size == 0 {
        let err = SolverError::InvalidConfig("Image size must be positive".into());
        return Err(err.into());
    }
    let field = checkpoint::read_square_field(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    let output = output.unwrap_or_else(|| file.with_extension("png"));
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let title = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "u".to_string());
    let visualiser = FieldVisualiser::new(dir, size, size)?;
    visualiser.plot_to(&field, &output, &title)?;
    println!("Saved {}", output.display());
    Ok(())
}
