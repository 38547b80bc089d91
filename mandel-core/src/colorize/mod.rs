//! Colorization of computed grids.
//!
//! A [Colorizer] is an extension that maps point results to pixels.
//! The pipeline drives it through a fixed sequence of hooks:
//!
//! 1.  `setup`, once, after arguments are bound to its parameters;
//! 2.  `prepass` on every point, in row-major order, if `has_prepass` says so;
//! 3.  `precolor`, once;
//! 4.  `colorize` on every point, in row-major order.
//!
//! Completed pixel rows are streamed to a [RowSink] in row order.

use crate::{pixel::Pixel, Error, FractalMetadata, Grid, PointResult};

mod args;
mod builtin;

pub use args::{bind, parse_args, ArgValue, ParamKind, ParamSpec};
pub use builtin::{by_name, names, Bands, Histogram, Smooth, DEFAULT_COLORIZER};

/// An extension that turns point results into pixels.
///
/// Only `name` and `colorize` are required; every other hook defaults to a no-op.
/// Hooks report failures as strings; the pipeline aborts on the first one.
pub trait Colorizer {
    /// Name of the colorizer, e.g. `smooth`.
    fn name(&self) -> &str;

    /// Parameters that can be set from an argument string.
    fn parameters(&self) -> &[ParamSpec] {
        &[]
    }

    /// Sets a declared parameter. The value already has the declared kind.
    fn set_parameter(&mut self, name: &str, value: ArgValue) -> Result<(), String> {
        Err(format!("{} has no parameter {} ({:?})", self.name(), name, value))
    }

    /// Called once, before any point is processed.
    fn setup(&mut self, _metadata: &FractalMetadata) -> Result<(), String> {
        Ok(())
    }

    /// Whether the colorizer wants a scan over every point before coloring.
    fn has_prepass(&self) -> bool {
        false
    }

    /// Observes one point during the pre-scan.
    fn prepass(&mut self, _point: &PointResult) -> Result<(), String> {
        Ok(())
    }

    /// Called once, after the pre-scan and before the first `colorize`.
    fn precolor(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Maps one point to a pixel.
    fn colorize(&mut self, point: &PointResult) -> Result<Pixel, String>;
}

/// Consumer of completed pixel rows.
pub trait RowSink {
    fn write_row(&mut self, row: &[Pixel]) -> Result<(), Error>;
}

/// Collects rows in memory.
impl RowSink for Vec<Vec<Pixel>> {
    fn write_row(&mut self, row: &[Pixel]) -> Result<(), Error> {
        self.push(row.to_vec());
        Ok(())
    }
}

fn hook_error(hook: &'static str) -> impl FnOnce(String) -> Error {
    move |message| Error::Colorizer { hook, message }
}

/// State of one colorization run.
///
/// Per-run state lives here rather than in the colorizer,
/// e.g. the answer to `has_prepass`, which is asked once.
pub struct ColorSession<'a> {
    colorizer: &'a mut dyn Colorizer,
    metadata: FractalMetadata,
    has_prepass: Option<bool>,
}

impl<'a> ColorSession<'a> {
    /// Binds `args` to the colorizer's parameters and runs its `setup` hook.
    pub fn setup(
        colorizer: &'a mut dyn Colorizer,
        metadata: &FractalMetadata,
        args: &str,
    ) -> Result<Self, Error> {
        bind(colorizer, args)?;
        colorizer.setup(metadata).map_err(hook_error("setup"))?;
        tracing::debug!("colorizer {} set up", colorizer.name());
        Ok(ColorSession {
            colorizer,
            metadata: *metadata,
            has_prepass: None,
        })
    }

    pub fn has_prepass(&mut self) -> bool {
        let colorizer = &self.colorizer;
        *self
            .has_prepass
            .get_or_insert_with(|| colorizer.has_prepass())
    }

    /// Runs the pre-scan (if wanted), `precolor`, and `colorize` over the grid,
    /// writing each row of pixels to `sink` as it is completed.
    pub fn run(&mut self, grid: &Grid, sink: &mut dyn RowSink) -> Result<(), Error> {
        let params = &self.metadata.params;
        if grid.width() != params.samples_real || grid.height() != params.samples_img {
            return Err(Error::InvalidArgument(format!(
                "grid is {}x{} but metadata declares {}x{}",
                grid.width(),
                grid.height(),
                params.samples_real,
                params.samples_img
            )));
        }

        if self.has_prepass() {
            for point in grid.points() {
                self.colorizer
                    .prepass(point)
                    .map_err(hook_error("prepass"))?;
            }
            tracing::debug!("prepass complete");
        }

        self.colorizer.precolor().map_err(hook_error("precolor"))?;

        let mut pixels = Vec::with_capacity(grid.width());
        for (index, row) in grid.rows().enumerate() {
            pixels.clear();
            for point in row {
                pixels.push(
                    self.colorizer
                        .colorize(point)
                        .map_err(hook_error("colorize"))?,
                );
            }
            sink.write_row(&pixels)?;
            if index % 100 == 0 {
                tracing::debug!("colorized row {}", index);
            }
        }
        Ok(())
    }
}

/// Colorizes a grid, streaming rows to `sink`.
pub fn colorize(
    colorizer: &mut dyn Colorizer,
    metadata: &FractalMetadata,
    args: &str,
    grid: &Grid,
    sink: &mut dyn RowSink,
) -> Result<(), Error> {
    let span = tracing::info_span!("colorize", colorizer = colorizer.name());
    let _guard = span.enter();

    let mut session = ColorSession::setup(colorizer, metadata, args)?;
    session.run(grid, sink)
}
