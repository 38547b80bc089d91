//! The three tools: compute a fractal file, color one, or both with caching.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use mandel_core::{
    bmp::BmpWriter, colorize, fractal_file, Error, FractalMetadata, FractalParameters, Grid,
};

/// Which colorizer to use, and the arguments to bind to it.
#[derive(Debug, Clone)]
pub struct ColorChoice {
    pub name: String,
    pub args: String,
}

impl Default for ColorChoice {
    fn default() -> Self {
        ColorChoice {
            name: colorize::DEFAULT_COLORIZER.to_owned(),
            args: String::new(),
        }
    }
}

/// Concurrency to compute with, given the `--jobs` value.
pub fn concurrency(jobs: usize) -> usize {
    if jobs == 0 {
        mandel_render::default_concurrency()
    } else {
        jobs
    }
}

/// Computes the grid and writes it to `output`.
pub fn compute(
    params: &FractalParameters,
    jobs: usize,
    output: &Path,
) -> Result<(FractalMetadata, Grid), Error> {
    tracing::info!(
        "computing ({}) to ({}), {}x{} samples",
        params.top_left,
        params.bottom_right,
        params.samples_real,
        params.samples_img
    );
    let grid = mandel_render::compute(params, concurrency(jobs))?;
    let metadata = FractalMetadata::from_grid(*params, &grid);
    tracing::info!(
        "diverged points took {} to {} iterations",
        metadata.min_iterations,
        metadata.max_iterations
    );
    fractal_file::write(output, &metadata, &grid)?;
    tracing::info!("wrote {}", output.display());
    Ok((metadata, grid))
}

/// Colors the fractal file at `input` into a bitmap at `output`.
pub fn color(input: &Path, output: &Path, choice: &ColorChoice) -> Result<(), Error> {
    let (metadata, grid) = fractal_file::read(input)?;
    color_grid(&metadata, &grid, output, choice)
}

fn color_grid(
    metadata: &FractalMetadata,
    grid: &Grid,
    output: &Path,
    choice: &ColorChoice,
) -> Result<(), Error> {
    // Resolve the colorizer before creating the output.
    let mut colorizer = colorize::by_name(&choice.name)?;
    let mut bmp = BmpWriter::create(output, grid.width(), grid.height())?;
    colorize::colorize(colorizer.as_mut(), metadata, &choice.args, grid, &mut bmp)?;
    bmp.finish()?;
    tracing::info!("wrote {}", output.display());
    Ok(())
}

/// Appends an extension to a path stem, keeping any dots already in it.
fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

/// Looks for a stored grid computed with equivalent parameters.
///
/// Anything wrong with the stored file means it is not reused.
fn cached(path: &Path, wanted: &FractalMetadata) -> Option<(FractalMetadata, Grid)> {
    if !path.exists() {
        return None;
    }
    match fractal_file::read_metadata(path) {
        Err(err) => {
            tracing::warn!("ignoring unreadable {}: {}", path.display(), err);
            None
        }
        Ok(stored) if !stored.similar(wanted) => {
            tracing::info!("parameters changed since {} was written", path.display());
            None
        }
        Ok(_) => match fractal_file::read(path) {
            Ok(found) => Some(found),
            Err(err) => {
                tracing::warn!("ignoring stale {}: {}", path.display(), err);
                None
            }
        },
    }
}

/// What `render` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub fractal: PathBuf,
    pub image: PathBuf,
    /// Whether the stored grid was reused instead of recomputed.
    pub reused: bool,
}

/// Computes (or reuses) `STEM.fract`, then colors it into `STEM.bmp`.
pub fn render(
    params: &FractalParameters,
    jobs: usize,
    stem: &Path,
    choice: &ColorChoice,
) -> Result<Rendered, Error> {
    let fractal = with_suffix(stem, ".fract");
    let image = with_suffix(stem, ".bmp");

    let wanted = FractalMetadata::new(*params);
    let (metadata, grid, reused) = match cached(&fractal, &wanted) {
        Some((metadata, grid)) => {
            tracing::info!("reusing {}", fractal.display());
            (metadata, grid, true)
        }
        None => {
            let (metadata, grid) = compute(params, jobs, &fractal)?;
            (metadata, grid, false)
        }
    };

    color_grid(&metadata, &grid, &image, choice)?;
    Ok(Rendered {
        fractal,
        image,
        reused,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::complex::Complex64;
    use std::fs;

    fn params(limit: u32) -> FractalParameters {
        FractalParameters::new(
            Complex64::new(-2.0, 1.0),
            Complex64::new(1.0, -1.0),
            4.0,
            limit,
            12,
            10,
        )
        .unwrap()
    }

    #[test]
    fn suffixes_keep_dots() {
        assert_eq!(
            with_suffix(Path::new("out/zoom.v2"), ".bmp"),
            PathBuf::from("out/zoom.v2.bmp")
        );
    }

    #[test]
    fn compute_then_color() {
        let dir = tempfile::tempdir().unwrap();
        let fract = dir.path().join("a.fract");
        let bmp = dir.path().join("a.bmp");

        let (metadata, grid) = compute(&params(50), 2, &fract).unwrap();
        assert_eq!(fractal_file::read(&fract).unwrap(), (metadata, grid));

        color(&fract, &bmp, &ColorChoice::default()).unwrap();
        assert_eq!(fs::metadata(&bmp).unwrap().len(), 54 + 12 * 10 * 4);
    }

    #[test]
    fn unknown_colorizer_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fract = dir.path().join("a.fract");
        let bmp = dir.path().join("a.bmp");
        compute(&params(50), 1, &fract).unwrap();

        let choice = ColorChoice {
            name: "nonesuch".to_owned(),
            args: String::new(),
        };
        assert!(matches!(
            color(&fract, &bmp, &choice),
            Err(Error::Colorizer { .. })
        ));
        assert!(!bmp.exists());
    }

    #[test]
    fn color_rejects_bad_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let fract = dir.path().join("a.fract");
        compute(&params(50), 1, &fract).unwrap();

        let choice = ColorChoice {
            name: "bands".to_owned(),
            args: "cycles=lots".to_owned(),
        };
        assert!(matches!(
            color(&fract, &dir.path().join("a.bmp"), &choice),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn render_reuses_similar_file() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("shot");
        let choice = ColorChoice::default();

        let first = render(&params(50), 2, &stem, &choice).unwrap();
        assert!(!first.reused);
        assert!(first.fractal.exists());
        assert!(first.image.exists());

        let second = render(&params(50), 2, &stem, &choice).unwrap();
        assert!(second.reused);
        assert_eq!(second.image, first.image);

        // A different limit invalidates the stored grid.
        let third = render(&params(60), 2, &stem, &choice).unwrap();
        assert!(!third.reused);
        let (stored, _) = fractal_file::read(&third.fractal).unwrap();
        assert_eq!(stored.params.limit, 60);
    }

    #[test]
    fn render_recomputes_damaged_file() {
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("shot");
        let choice = ColorChoice::default();
        let first = render(&params(50), 1, &stem, &choice).unwrap();

        // Cut off the last row: the header still matches, the body does not.
        let bytes = fs::read(&first.fractal).unwrap();
        fs::write(&first.fractal, &bytes[..bytes.len() - 12 * 29]).unwrap();
        assert!(fractal_file::read_metadata(&first.fractal).is_ok());

        let second = render(&params(50), 1, &stem, &choice).unwrap();
        assert!(!second.reused);
        assert!(fractal_file::read(&second.fractal).is_ok());

        // Garbage is not reused either.
        fs::write(&first.fractal, b"not a fractal").unwrap();
        assert!(!render(&params(50), 1, &stem, &choice).unwrap().reused);
    }
}
