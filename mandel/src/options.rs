//! Command-line options describing the sampling window.

use clap::Args;
use mandel_core::{Error, FractalParameters};
use num::complex::Complex64;

/// Sample count along each axis when none is given.
pub const DEFAULT_SAMPLES: usize = 100;

/// Extent of the set along each axis. Windows outside it only draw the exterior.
const SET_BOUND: f64 = 2.0;

/// Where to sample, how finely, and how hard to iterate.
#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// Number of samples along both axes.
    #[arg(short, long, conflicts_with_all = ["width", "height", "aspect"])]
    pub samples: Option<usize>,

    /// Number of samples along the real axis.
    #[arg(long)]
    pub width: Option<usize>,

    /// Number of samples along the imaginary axis.
    #[arg(long)]
    pub height: Option<usize>,

    /// WxH sample counts; the box height follows the aspect ratio. Requires --box.
    #[arg(long, value_parser = parse_aspect, conflicts_with_all = ["width", "height"], requires = "box_size")]
    pub aspect: Option<(usize, usize)>,

    /// Escape radius.
    #[arg(short, long, default_value_t = 256.0)]
    pub escape: f64,

    /// Iteration limit.
    #[arg(short, long, default_value_t = 1000)]
    pub limit: u32,

    /// Real part of the top-left corner.
    #[arg(long, allow_negative_numbers = true)]
    pub ltr: Option<f64>,

    /// Imaginary part of the top-left corner.
    #[arg(long, allow_negative_numbers = true)]
    pub lti: Option<f64>,

    /// Real part of the bottom-right corner.
    #[arg(long, allow_negative_numbers = true)]
    pub rbr: Option<f64>,

    /// Imaginary part of the bottom-right corner.
    #[arg(long, allow_negative_numbers = true)]
    pub rbi: Option<f64>,

    /// Width of the box; anchored by a center or by one of the corners.
    #[arg(long = "box", allow_negative_numbers = true)]
    pub box_size: Option<f64>,

    /// Real part of the box center.
    #[arg(long, allow_negative_numbers = true, requires = "box_size")]
    pub cr: Option<f64>,

    /// Imaginary part of the box center.
    #[arg(long, allow_negative_numbers = true, requires = "box_size")]
    pub ci: Option<f64>,
}

impl Default for WindowArgs {
    fn default() -> Self {
        WindowArgs {
            samples: None,
            width: None,
            height: None,
            aspect: None,
            escape: 256.0,
            limit: 1000,
            ltr: None,
            lti: None,
            rbr: None,
            rbi: None,
            box_size: None,
            cr: None,
            ci: None,
        }
    }
}

fn parse_aspect(s: &str) -> Result<(usize, usize), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {:?}", s))?;
    let dim = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|err| format!("invalid dimension {:?} in {:?}: {}", v, s, err))
    };
    Ok((dim(w)?, dim(h)?))
}

fn invalid(message: &str) -> Error {
    Error::InvalidArgument(message.to_owned())
}

impl WindowArgs {
    /// Resolves the options into validated fractal parameters.
    pub fn resolve(&self) -> Result<FractalParameters, Error> {
        let (width, height) = self.dimensions()?;
        let (top_left, bottom_right) = self.corners(width, height)?;

        if top_left.re < -SET_BOUND
            || top_left.im > SET_BOUND
            || bottom_right.re > SET_BOUND
            || bottom_right.im < -SET_BOUND
        {
            tracing::warn!(
                "window ({}) to ({}) extends past the set's bounds, (-2+2i) to (2-2i)",
                top_left,
                bottom_right
            );
        }

        FractalParameters::new(
            top_left,
            bottom_right,
            self.escape,
            self.limit,
            width,
            height,
        )
    }

    fn dimensions(&self) -> Result<(usize, usize), Error> {
        if let Some((w, h)) = self.aspect {
            if self.samples.is_some() || self.width.is_some() || self.height.is_some() {
                return Err(invalid(
                    "--aspect cannot be combined with --samples, --width, or --height",
                ));
            }
            return Ok((w, h));
        }
        if let Some(n) = self.samples {
            if self.width.is_some() || self.height.is_some() {
                return Err(invalid("--samples cannot be combined with --width or --height"));
            }
            return Ok((n, n));
        }
        Ok((
            self.width.unwrap_or(DEFAULT_SAMPLES),
            self.height.unwrap_or(DEFAULT_SAMPLES),
        ))
    }

    fn corners(&self, width: usize, height: usize) -> Result<(Complex64, Complex64), Error> {
        if self.cr.is_some() != self.ci.is_some() {
            return Err(invalid("--cr and --ci must be given together"));
        }

        let size = match self.box_size {
            Some(size) => size,
            None => {
                if self.aspect.is_some() {
                    return Err(invalid("--aspect requires --box"));
                }
                if self.cr.is_some() {
                    return Err(invalid("--cr and --ci may only be used with --box"));
                }
                return Ok((
                    Complex64::new(self.ltr.unwrap_or(-SET_BOUND), self.lti.unwrap_or(SET_BOUND)),
                    Complex64::new(self.rbr.unwrap_or(SET_BOUND), self.rbi.unwrap_or(-SET_BOUND)),
                ));
            }
        };

        if !(size.is_finite() && size > 0.0) {
            return Err(invalid("--box must be positive"));
        }
        let box_width = size;
        let box_height = match self.aspect {
            Some(_) => size * (height as f64 / width as f64),
            None => size,
        };
        let extent = Complex64::new(box_width, -box_height);

        match (self.cr, self.ci, self.ltr, self.lti, self.rbr, self.rbi) {
            (Some(re), Some(im), _, _, _, _) => {
                let center = Complex64::new(re, im);
                Ok((center - extent / 2.0, center + extent / 2.0))
            }
            (_, _, Some(re), Some(im), _, _) => {
                let top_left = Complex64::new(re, im);
                Ok((top_left, top_left + extent))
            }
            (_, _, _, _, Some(re), Some(im)) => {
                let bottom_right = Complex64::new(re, im);
                Ok((bottom_right - extent, bottom_right))
            }
            _ => Err(invalid(
                "--box needs one of (--cr, --ci), (--ltr, --lti), or (--rbr, --rbi)",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        window: WindowArgs,
    }

    fn parse(args: &[&str]) -> Result<WindowArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("mandel").chain(args.iter().copied()))
            .map(|h| h.window)
    }

    fn resolve(args: &[&str]) -> Result<FractalParameters, Error> {
        parse(args).unwrap().resolve()
    }

    #[test]
    fn defaults() {
        let p = resolve(&[]).unwrap();
        assert_eq!(p.top_left, Complex64::new(-2.0, 2.0));
        assert_eq!(p.bottom_right, Complex64::new(2.0, -2.0));
        assert_eq!(p.escape_radius, 256.0);
        assert_eq!(p.limit, 1000);
        assert_eq!((p.samples_real, p.samples_img), (100, 100));
        assert_eq!(WindowArgs::default().resolve().unwrap(), p);
    }

    #[test]
    fn explicit_corners() {
        let p = resolve(&[
            "--ltr", "-1.5", "--lti", "1", "--rbr", "0.5", "--rbi", "-1", "--width", "30",
            "--height", "20",
        ])
        .unwrap();
        assert_eq!(p.top_left, Complex64::new(-1.5, 1.0));
        assert_eq!(p.bottom_right, Complex64::new(0.5, -1.0));
        assert_eq!((p.samples_real, p.samples_img), (30, 20));
    }

    #[test]
    fn box_around_center() {
        let p = resolve(&["--box", "1", "--cr", "-0.5", "--ci", "0.25", "-s", "16"]).unwrap();
        assert_eq!(p.top_left, Complex64::new(-1.0, 0.75));
        assert_eq!(p.bottom_right, Complex64::new(0.0, -0.25));
        assert_eq!((p.samples_real, p.samples_img), (16, 16));
    }

    #[test]
    fn box_from_a_corner() {
        let p = resolve(&["--box", "2", "--ltr", "-2", "--lti", "1"]).unwrap();
        assert_eq!(p.top_left, Complex64::new(-2.0, 1.0));
        assert_eq!(p.bottom_right, Complex64::new(0.0, -1.0));

        let p = resolve(&["--box", "2", "--rbr", "1", "--rbi", "-1"]).unwrap();
        assert_eq!(p.top_left, Complex64::new(-1.0, 1.0));
        assert_eq!(p.bottom_right, Complex64::new(1.0, -1.0));
    }

    #[test]
    fn aspect_sets_box_height() {
        let p = resolve(&["--aspect", "40x20", "--box", "2", "--cr", "0", "--ci", "0"]).unwrap();
        assert_eq!((p.samples_real, p.samples_img), (40, 20));
        assert_eq!(p.top_left, Complex64::new(-1.0, 0.5));
        assert_eq!(p.bottom_right, Complex64::new(1.0, -0.5));
    }

    #[test]
    fn parses_aspect() {
        assert_eq!(parse_aspect("640x480"), Ok((640, 480)));
        assert_eq!(parse_aspect("10X12"), Ok((10, 12)));
        assert!(parse_aspect("640*480").is_err());
        assert!(parse_aspect("x480").is_err());
    }

    #[test]
    fn conflicting_options() {
        assert!(parse(&["--aspect", "40x20"]).is_err());
        assert!(parse(&["--aspect", "40x20", "--box", "1", "-s", "20"]).is_err());
        assert!(parse(&["--aspect", "40x20", "--box", "1", "--width", "20"]).is_err());
        assert!(parse(&["-s", "20", "--height", "20"]).is_err());
        assert!(parse(&["--cr", "0", "--ci", "0"]).is_err());
    }

    #[test]
    fn incomplete_box() {
        // clap allows these; resolution does not.
        assert!(matches!(
            resolve(&["--box", "1", "--cr", "0"]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve(&["--box", "1"]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve(&["--box", "1", "--ltr", "0"]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve(&["--box", "0", "--cr", "0", "--ci", "0"]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve(&["--box", "-1", "--cr", "0", "--ci", "0"]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn resolution_checks_conflicts_too() {
        let args = WindowArgs {
            cr: Some(0.0),
            ci: Some(0.0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());

        let args = WindowArgs {
            aspect: Some((20, 20)),
            width: Some(20),
            box_size: Some(1.0),
            cr: Some(0.0),
            ci: Some(0.0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn parameters_are_validated() {
        assert!(resolve(&["-s", "5"]).is_err());
        assert!(resolve(&["-l", "9"]).is_err());
        assert!(resolve(&["-e", "2"]).is_err());
        assert!(resolve(&["--ltr", "1", "--rbr", "0"]).is_err());
    }

    #[test]
    fn outside_the_set_is_allowed() {
        let p = resolve(&["--ltr", "-3", "--lti", "3"]).unwrap();
        assert_eq!(p.top_left, Complex64::new(-3.0, 3.0));
    }
}
