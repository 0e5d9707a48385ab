//! End-to-end behaviour of the Jacobi solver: invariants that hold for any
//! grid, convergence, and the files a run leaves behind.

use poisson_solver::checkpoint::{self, checkpoint_name, FINAL_FILE, SOURCE_FILE};
use poisson_solver::{ExecutionMode, Field, Grid, Solver, SolverParams};
use proptest::prelude::*;

fn rotation_symmetric_source(grid: &Grid) -> Field {
    let g = |i: usize, j: usize| ((i * 31 + j * 7) as f64 * 0.37).sin() + (j as f64) * 0.01;
    Field::from_fn(grid, |i, j| g(i, j) + g(grid.ny - 1 - i, grid.nx - 1 - j))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn boundary_stays_zero(nx in 3usize..24, ny in 3usize..24, sweeps in 1usize..40) {
        let grid = Grid::new(nx, ny, 1.0).unwrap();
        let mut solver = Solver::new(grid, SolverParams::fixed(sweeps)).unwrap();
        while !solver.is_finished() {
            solver.step();
            prop_assert!(solver.current().boundary_is_zero());
        }
    }

    #[test]
    fn rotation_symmetry_is_preserved(nx in 3usize..20, ny in 3usize..20, sweeps in 1usize..30) {
        let grid = Grid::new(nx, ny, 1.0).unwrap();
        let source = rotation_symmetric_source(&grid);
        let params = SolverParams::fixed(sweeps);
        let mut solver = Solver::with_source(grid, source, params).unwrap();
        solver.run().unwrap();

        let u = solver.current();
        for i in 0..ny {
            for j in 0..nx {
                let a = u.get(i, j).unwrap();
                let b = u.get(ny - 1 - i, nx - 1 - j).unwrap();
                prop_assert!(
                    (a - b).abs() <= 1e-12 * (1.0 + a.abs()),
                    "({}, {}): {} vs {}",
                    i,
                    j,
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn serial_and_parallel_runs_agree(n in 3usize..40, sweeps in 1usize..25) {
        let grid = Grid::square(n).unwrap();
        let serial_params = SolverParams::fixed(sweeps).with_mode(ExecutionMode::Serial);
        let parallel_params = SolverParams::fixed(sweeps).with_mode(ExecutionMode::Parallel);
        let mut serial = Solver::new(grid, serial_params).unwrap();
        let mut parallel = Solver::new(grid, parallel_params).unwrap();
        serial.run().unwrap();
        parallel.run().unwrap();
        prop_assert_eq!(serial.current(), parallel.current());
    }
}

#[test]
fn tiny_grids_have_nothing_to_update() {
    for (nx, ny) in [(1, 1), (2, 5), (7, 2)] {
        let grid = Grid::new(nx, ny, 1.0).unwrap();
        let mut solver = Solver::new(grid, SolverParams::fixed(3)).unwrap();
        let summary = solver.run().unwrap();
        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.mean, 0.0);
        assert!(solver.current().values().all(|v| v == 0.0));
    }
}

#[test]
fn fixed_sweeps_on_64_grid_match_recorded_values() {
    // Guards the initializer and the stencil against accidental edits.
    let grid = Grid::square(64).unwrap();
    let mut solver = Solver::new(grid, SolverParams::fixed(500)).unwrap();
    let summary = solver.run().unwrap();

    assert_eq!(summary.center, (32, 32));
    let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * b.abs();
    assert!(
        close(summary.center_value, -9.982265327610142),
        "u[32,32] = {}",
        summary.center_value
    );
    assert!(close(summary.mean, -0.046056921237076776), "mean = {}", summary.mean);
    assert_eq!(summary.lines()[0], "u[32,32] = -9.982265");
    assert_eq!(summary.lines()[1], "Mean u = -0.046057");
}

#[test]
fn convergence_norm_never_grows() {
    let grid = Grid::square(32).unwrap();
    let params = SolverParams::fixed(2000).with_threshold(1e-300, 100);
    let mut solver = Solver::new(grid, params).unwrap();
    let summary = solver.run().unwrap();

    assert!(!summary.converged);
    assert_eq!(summary.norm_history.len(), 20);
    assert!(summary.norms_trend_down());
    for pair in summary.norm_history.windows(2) {
        assert!(
            pair[1].norm2 <= pair[0].norm2,
            "norm grew between {} and {}",
            pair[0].iteration,
            pair[1].iteration
        );
    }
}

#[test]
fn field_settles_towards_the_poisson_solution() {
    // Once converged, one more sweep leaves the field (nearly) unchanged.
    let grid = Grid::square(12).unwrap();
    let params = SolverParams::fixed(100_000).with_threshold(1e-10, 50);
    let mut solver = Solver::new(grid, params).unwrap();
    let summary = solver.run().unwrap();
    assert!(summary.converged);
    assert!(summary.iterations < 100_000);
    assert!(solver.diff_norm2() < 1e-20);
}

#[test]
fn run_writes_source_initial_periodic_and_final_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("run");
    let grid = Grid::square(16).unwrap();
    let params = SolverParams::fixed(250).with_output(&out, 100);
    let mut solver = Solver::new(grid, params).unwrap();
    let summary = solver.run().unwrap();

    for name in [
        SOURCE_FILE.to_string(),
        checkpoint_name(0),
        checkpoint_name(100),
        checkpoint_name(200),
        FINAL_FILE.to_string(),
    ] {
        assert!(out.join(&name).is_file(), "missing {}", name);
    }
    assert!(!out.join(checkpoint_name(250)).exists());
    assert_eq!(summary.files.len(), 5);

    let initial = checkpoint::read_square_field(&out.join(checkpoint_name(0))).unwrap();
    assert!(initial.values().all(|v| v == 0.0));

    let source = checkpoint::read_square_field(&out.join(SOURCE_FILE)).unwrap();
    assert_eq!(&source, solver.source());

    let last = checkpoint::read_square_field(&out.join(FINAL_FILE)).unwrap();
    for (a, b) in last.values().zip(solver.current().values()) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn checkpoint_holds_the_state_of_its_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let grid = Grid::square(20).unwrap();
    let params = SolverParams::fixed(300).with_output(dir.path(), 100);
    let mut solver = Solver::new(grid, params).unwrap();
    solver.run().unwrap();

    let mut reference = Solver::new(grid, SolverParams::fixed(200)).unwrap();
    reference.run().unwrap();

    let dumped =
        checkpoint::read_square_field(&dir.path().join(checkpoint_name(200))).unwrap();
    assert_eq!(&dumped, reference.current());
}

#[test]
fn converged_iteration_is_not_checkpointed() {
    let dir = tempfile::tempdir().unwrap();
    let grid = Grid::square(16).unwrap();
    let params = SolverParams::fixed(1000)
        .with_threshold(1e6, 100)
        .with_output(dir.path(), 100);
    let mut solver = Solver::new(grid, params).unwrap();
    let summary = solver.run().unwrap();

    assert!(summary.converged);
    assert_eq!(summary.iterations, 100);
    assert!(!dir.path().join(checkpoint_name(100)).exists());
    assert!(dir.path().join(FINAL_FILE).is_file());
}

#[test]
fn unwritable_output_directory_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let grid = Grid::square(8).unwrap();
    let params = SolverParams::fixed(10).with_output(&blocker, 5);
    let mut solver = Solver::new(grid, params).unwrap();
    assert!(solver.run().is_err());
}
