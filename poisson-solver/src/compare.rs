//! Side-by-side comparison of two field dumps, used to check that runs in
//! different execution modes agree.

use crate::checkpoint;
use crate::error::{Result, SolverError};
use crate::field::Field;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub max_abs_a: f64,
    pub max_abs_b: f64,
    pub max_abs_diff: f64,
}

impl Comparison {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Maximum absolute value in file1: {}", self.max_abs_a),
            format!("Maximum absolute value in file2: {}", self.max_abs_b),
            format!("Maximum absolute difference:     {}", self.max_abs_diff),
        ]
    }
}

pub fn compare_fields(a: &Field, b: &Field) -> Result<Comparison> {
    if a.dims() != b.dims() {
        return Err(SolverError::Format(format!(
            "cannot compare a {:?} field with a {:?} field",
            a.dims(),
            b.dims()
        )));
    }
    let max_abs_diff = a
        .values()
        .zip(b.values())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0_f64, f64::max);

    Ok(Comparison {
        max_abs_a: a.max_abs(),
        max_abs_b: b.max_abs(),
        max_abs_diff,
    })
}

pub fn compare_files(a: &Path, b: &Path) -> Result<Comparison> {
    let fa = checkpoint::read_square_field(a)?;
    let fb = checkpoint::read_square_field(b)?;
    compare_fields(&fa, &fb)
}
