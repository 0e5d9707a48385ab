use crate::error::{Result, SolverError};
use crate::field::Field;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

/// Cells per axis drawn at most; larger fields are sampled with a stride.
const MAX_CELLS_PER_AXIS: usize = 256;

pub struct FieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    gradient: Box<dyn colorgrad::Gradient>,
}

impl FieldVisualiser {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir).map_err(|e| SolverError::io(output_dir, e))?;

        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            gradient,
        })
    }

    pub fn frame_path(&self, field_name: &str, iteration: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_{:06}.png", field_name, iteration))
    }

    /// Heat map with a symmetric colour range `±max|v|`.
    pub fn plot_field(&self, data: &Field, iteration: usize, field_name: &str) -> Result<PathBuf> {
        let filename = self.frame_path(field_name, iteration);
        self.plot_to(data, &filename, &format!("{} (iteration {})", field_name, iteration))?;
        Ok(filename)
    }

    pub fn plot_to(&self, data: &Field, filename: &Path, title: &str) -> Result<()> {
        let root = BitMapBackend::new(filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let (nx, ny) = data.dims();
        let max_abs = data.max_abs();
        let min_val = -max_abs;
        let max_val = max_abs;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 30))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0..nx, 0..ny)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .x_desc("j (columns)")
            .y_desc("i (rows)")
            .draw()
            .map_err(render_err)?;

        let stride_x = nx.div_ceil(MAX_CELLS_PER_AXIS).max(1);
        let stride_y = ny.div_ceil(MAX_CELLS_PER_AXIS).max(1);

        let cells = (0..ny).step_by(stride_y).flat_map(|i| {
            (0..nx).step_by(stride_x).map(move |j| (i, j))
        });
        chart
            .draw_series(cells.map(|(i, j)| {
                let value = data.get(i, j).unwrap_or(0.0);
                let color = self.value_to_color(value, min_val, max_val);
                Rectangle::new(
                    [(j, i), ((j + stride_x).min(nx), (i + stride_y).min(ny))],
                    color.filled(),
                )
            }))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
        info!("Saved frame: {}", filename.display());
        Ok(())
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}

fn render_err<E: std::fmt::Display>(e: E) -> SolverError {
    SolverError::Render(e.to_string())
}
