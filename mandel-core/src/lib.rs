//! Library code for the Mandel fractal tools.
//!
//! The pieces here are leaf-first:
//! the escape-time evaluator, the sample grid and its on-disk format,
//! and the colorization pipeline that turns a grid into pixels.

use num::complex::Complex64;

pub mod bmp;
pub mod colorize;
mod error;
pub mod fractal_file;
pub mod mandelbrot;
pub mod pixel;

pub use error::Error;

/// Smallest sample count along either axis.
pub const MIN_SAMPLES: usize = 10;

/// Smallest iteration limit.
pub const MIN_LIMIT: u32 = 10;

/// Escape radii must be strictly larger than this.
pub const MIN_ESCAPE_RADIUS: f64 = 2.0;

/// Parameters of a fractal computation.
///
/// The sampling box runs from `top_left` to `bottom_right`:
/// real parts increase to the right, imaginary parts decrease downward.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FractalParameters {
    pub top_left: Complex64,
    pub bottom_right: Complex64,
    pub escape_radius: f64,
    pub limit: u32,
    pub samples_real: usize,
    pub samples_img: usize,
}

impl FractalParameters {
    /// Construct parameters, checking them with [FractalParameters::validate].
    pub fn new(
        top_left: Complex64,
        bottom_right: Complex64,
        escape_radius: f64,
        limit: u32,
        samples_real: usize,
        samples_img: usize,
    ) -> Result<Self, Error> {
        let params = FractalParameters {
            top_left,
            bottom_right,
            escape_radius,
            limit,
            samples_real,
            samples_img,
        };
        params.validate()?;
        Ok(params)
    }

    /// Checks the invariants of the parameter set.
    pub fn validate(&self) -> Result<(), Error> {
        let coords = [
            self.top_left.re,
            self.top_left.im,
            self.bottom_right.re,
            self.bottom_right.im,
            self.escape_radius,
        ];
        if coords.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "non-finite value in parameters: {:?}",
                self
            )));
        }
        if self.top_left.re >= self.bottom_right.re || self.top_left.im <= self.bottom_right.im {
            return Err(Error::InvalidArgument(format!(
                "top-left ({}) must be to the left of and above bottom-right ({})",
                self.top_left, self.bottom_right
            )));
        }
        if self.escape_radius <= MIN_ESCAPE_RADIUS {
            return Err(Error::InvalidArgument(format!(
                "escape radius must be larger than {}, got {}",
                MIN_ESCAPE_RADIUS, self.escape_radius
            )));
        }
        if self.limit < MIN_LIMIT {
            return Err(Error::InvalidArgument(format!(
                "iteration limit cannot be less than {}, got {}",
                MIN_LIMIT, self.limit
            )));
        }
        if self.samples_real < MIN_SAMPLES || self.samples_img < MIN_SAMPLES {
            return Err(Error::InvalidArgument(format!(
                "sample counts cannot be less than {}, got {}x{}",
                MIN_SAMPLES, self.samples_real, self.samples_img
            )));
        }
        Ok(())
    }

    /// Distance between neighboring samples along the real axis.
    pub fn real_increment(&self) -> f64 {
        (self.bottom_right.re - self.top_left.re) / self.samples_real as f64
    }

    /// Distance between neighboring rows along the imaginary axis.
    pub fn img_increment(&self) -> f64 {
        (self.top_left.im - self.bottom_right.im) / self.samples_img as f64
    }

    /// Imaginary coordinate of a row.
    ///
    /// Row 0 sits on the bottom edge of the box; rows move upward from there.
    pub fn row_base(&self, row: usize) -> f64 {
        self.bottom_right.im + self.img_increment() * row as f64
    }

    /// Complex coordinate of the sample at (row, column).
    pub fn coordinate(&self, row: usize, column: usize) -> Complex64 {
        sample_point(
            self.row_base(row),
            self.top_left.re,
            self.real_increment(),
            column,
        )
    }
}

/// Reconstructs a sample coordinate from the per-row scalars.
///
/// Both the serial and parallel compute paths go through here,
/// so the same index always yields the same bits.
#[inline]
pub fn sample_point(base_img: f64, base_real: f64, real_increment: f64, index: usize) -> Complex64 {
    Complex64::new(base_real + real_increment * index as f64, base_img)
}

/// Parameters plus statistics derived from a computed grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FractalMetadata {
    pub params: FractalParameters,
    /// Largest iteration count among diverged points.
    pub max_iterations: u32,
    /// Smallest iteration count among diverged points.
    pub min_iterations: u32,
}

impl FractalMetadata {
    /// Metadata with no derived statistics.
    pub fn new(params: FractalParameters) -> Self {
        FractalMetadata {
            params,
            max_iterations: 0,
            min_iterations: 0,
        }
    }

    /// Metadata for a computed grid, with the iteration statistics filled in.
    pub fn from_grid(params: FractalParameters, grid: &Grid) -> Self {
        let (min, max) = grid.iteration_range().unwrap_or((0, 0));
        FractalMetadata {
            params,
            max_iterations: max,
            min_iterations: min,
        }
    }

    /// Two metadata records are similar if a grid computed for one
    /// is valid for the other. Derived statistics are not compared.
    pub fn similar(&self, other: &FractalMetadata) -> bool {
        let (a, b) = (&self.params, &other.params);
        a.top_left == b.top_left
            && a.bottom_right == b.bottom_right
            && a.escape_radius == b.escape_radius
            && a.limit == b.limit
            && a.samples_real == b.samples_real
            && a.samples_img == b.samples_img
    }
}

/// Result of evaluating a single point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PointResult {
    /// The last iterate computed.
    pub last_value: Complex64,
    /// Modulus of `last_value`.
    pub last_modulus: f64,
    /// Number of iterations completed.
    pub iterations: u32,
    /// Whether the iterate left the escape radius.
    pub diverged: bool,
}

/// Grid of point results: `samples_img` rows of `samples_real` points.
///
/// Each row is its own allocation, so rows can be handed out to different
/// writers without any of them sharing memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    width: usize,
    rows: Vec<Vec<PointResult>>,
}

impl Grid {
    /// Allocates a grid of default (zeroed) points.
    pub fn new(width: usize, height: usize) -> Self {
        let rows = (0..height)
            .map(|_| vec![PointResult::default(); width])
            .collect();
        Grid { width, rows }
    }

    /// Builds a grid from rows, which must all have the given width.
    pub fn from_rows(width: usize, rows: Vec<Vec<PointResult>>) -> Result<Self, Error> {
        if let Some(row) = rows.iter().find(|row| row.len() != width) {
            return Err(Error::RowWidth {
                expected: width,
                actual: row.len(),
            });
        }
        Ok(Grid { width, rows })
    }

    /// Number of points in each row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[PointResult]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Rows in index order.
    pub fn rows(&self) -> impl Iterator<Item = &[PointResult]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Mutable rows in index order. Each row is a disjoint borrow.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [PointResult]> + '_ {
        self.rows.iter_mut().map(Vec::as_mut_slice)
    }

    /// All points in row-major order.
    pub fn points(&self) -> impl Iterator<Item = &PointResult> + '_ {
        self.rows.iter().flatten()
    }

    /// (min, max) iteration counts over diverged points, if any diverged.
    pub fn iteration_range(&self) -> Option<(u32, u32)> {
        use rayon::prelude::*;
        self.rows
            .par_iter()
            .filter_map(|row| {
                row.iter()
                    .filter(|p| p.diverged)
                    .fold(None, |acc: Option<(u32, u32)>, p| {
                        Some(match acc {
                            None => (p.iterations, p.iterations),
                            Some((min, max)) => (min.min(p.iterations), max.max(p.iterations)),
                        })
                    })
            })
            .reduce_with(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}
