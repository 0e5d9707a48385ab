//! Flat binary field dumps and the background checkpoint writer.
//!
//! # File format
//!
//! ```text
//! [count: u64, little endian]
//! [values: count * f64, little endian, row-major]
//! ```
//!
//! No magic and no shape: readers recover a square shape from `count`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Result, SolverError};
use crate::field::{Field, Snapshot};

/// Source field dump.
pub const SOURCE_FILE: &str = "f.bin";
/// Final field dump.
pub const FINAL_FILE: &str = "u_end.bin";

const HEADER_BYTES: u64 = 8;
const VALUE_BYTES: u64 = 8;

/// `u000100.bin` for iteration 100.
pub fn checkpoint_name(iteration: usize) -> String {
    format!("u{:06}.bin", iteration)
}

pub fn checkpoint_path(dir: &Path, iteration: usize) -> PathBuf {
    dir.join(checkpoint_name(iteration))
}

pub fn encode<W: Write>(
    writer: &mut W,
    count: usize,
    values: impl IntoIterator<Item = f64>,
) -> std::io::Result<()> {
    writer.write_all(&(count as u64).to_le_bytes())?;
    let mut written = 0usize;
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
        written += 1;
    }
    if written != count {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("header announces {} values but {} were written", count, written),
        ));
    }
    Ok(())
}

pub fn decode<R: Read>(reader: &mut R) -> Result<Vec<f64>> {
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .map_err(|_| SolverError::Format("missing element count".into()))?;
    let count = u64::from_le_bytes(header);
    let count = usize::try_from(count)
        .map_err(|_| SolverError::Format(format!("element count {} is too large", count)))?;

    let mut values = Vec::with_capacity(count.min(1 << 20));
    let mut buf = [0u8; 8];
    for idx in 0..count {
        reader.read_exact(&mut buf).map_err(|_| {
            SolverError::Format(format!("truncated data: expected {} values, got {}", count, idx))
        })?;
        values.push(f64::from_le_bytes(buf));
    }

    let mut rest = [0u8; 1];
    match reader.read(&mut rest) {
        Ok(0) => Ok(values),
        Ok(_) => Err(SolverError::Format(format!("trailing data after {} values", count))),
        Err(e) => Err(SolverError::Format(format!("read error after data: {}", e))),
    }
}

pub fn write_values(path: &Path, values: &[f64]) -> Result<()> {
    write_iter(path, values.len(), values.iter().copied())
}

pub fn write_field(path: &Path, field: &Field) -> Result<()> {
    write_iter(path, field.len(), field.values())
}

fn write_iter(path: &Path, count: usize, values: impl IntoIterator<Item = f64>) -> Result<()> {
    let file = File::create(path).map_err(|e| SolverError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    encode(&mut writer, count, values).map_err(|e| SolverError::io(path, e))?;
    writer.flush().map_err(|e| SolverError::io(path, e))
}

pub fn read_values(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path).map_err(|e| SolverError::io(path, e))?;
    let len = file.metadata().map_err(|e| SolverError::io(path, e))?.len();
    if len < HEADER_BYTES || (len - HEADER_BYTES) % VALUE_BYTES != 0 {
        return Err(SolverError::Format(format!(
            "'{}' has {} bytes, not a count header plus whole f64 values",
            path.display(),
            len
        )));
    }
    decode(&mut BufReader::new(file))
}

/// Read a dump and reshape it into a square field.
pub fn read_square_field(path: &Path) -> Result<Field> {
    let values = read_values(path)?;
    let count = values.len();
    let n = (count as f64).sqrt().round() as usize;
    if n * n != count {
        return Err(SolverError::Format(format!(
            "'{}' holds {} values, which is not a square field",
            path.display(),
            count
        )));
    }
    Field::from_row_major(n, n, values)
}

/// Writes snapshots on a background thread while the solver keeps iterating.
///
/// At most one write is in flight: submitting a new snapshot first joins the
/// previous write. Every write is joined by [`CheckpointWriter::finish`].
pub struct CheckpointWriter {
    dir: PathBuf,
    pending: Option<JoinHandle<Result<PathBuf>>>,
    written: Vec<PathBuf>,
}

impl CheckpointWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SolverError::io(&dir, e))?;
        Ok(CheckpointWriter {
            dir,
            pending: None,
            written: Vec::new(),
        })
    }

    /// Hand a snapshot to the background writer.
    pub fn submit(&mut self, snapshot: Snapshot) -> Result<()> {
        self.wait()?;

        let path = checkpoint_path(&self.dir, snapshot.iteration);
        let handle = thread::Builder::new()
            .name(format!("checkpoint-{:06}", snapshot.iteration))
            .spawn(move || -> Result<PathBuf> {
                write_values(&path, snapshot.values())?;
                Ok(path)
            })
            .map_err(|e| SolverError::io(&self.dir, e))?;
        self.pending = Some(handle);
        Ok(())
    }

    /// Write a field under `name` synchronously.
    pub fn write_now(&mut self, name: &str, field: &Field) -> Result<PathBuf> {
        let path = self.dir.join(name);
        write_field(&path, field)?;
        debug!("Wrote {}", path.display());
        self.written.push(path.clone());
        Ok(path)
    }

    /// Join the in-flight write, if any.
    pub fn wait(&mut self) -> Result<()> {
        if let Some(handle) = self.pending.take() {
            let path = handle
                .join()
                .map_err(|_| SolverError::Checkpoint("writer thread panicked".into()))??;
            debug!("Wrote checkpoint {}", path.display());
            self.written.push(path);
        }
        Ok(())
    }

    /// Join outstanding work and return every file written, in order.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.wait()?;
        Ok(std::mem::take(&mut self.written))
    }
}

impl Drop for CheckpointWriter {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            match handle.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Checkpoint write failed during shutdown: {}", e),
                Err(_) => warn!("Checkpoint writer panicked during shutdown"),
            }
        }
    }
}
