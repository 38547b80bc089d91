//! Colorizers that ship with the library.

use std::collections::BTreeMap;

use super::{ArgValue, Colorizer, ParamKind, ParamSpec};
use crate::{pixel::Pixel, Error, FractalMetadata, PointResult};

/// Colorizer used when none is named.
pub const DEFAULT_COLORIZER: &str = "smooth";

type Constructor = fn() -> Box<dyn Colorizer>;

fn construct<C: Colorizer + Default + 'static>() -> Box<dyn Colorizer> {
    Box::<C>::default()
}

const COLORIZERS: &[(&str, Constructor)] = &[
    ("smooth", construct::<Smooth>),
    ("bands", construct::<Bands>),
    ("histogram", construct::<Histogram>),
];

/// List the colorizers that can be looked up by name.
pub fn names() -> impl Iterator<Item = &'static str> {
    COLORIZERS.iter().map(|(name, _)| *name)
}

/// Resolves a colorizer by name.
pub fn by_name(name: &str) -> Result<Box<dyn Colorizer>, Error> {
    // Linear scan, we don't have that many options:
    for (candidate, constructor) in COLORIZERS.iter() {
        if *candidate == name {
            return Ok(constructor());
        }
    }
    Err(Error::Colorizer {
        hook: "colorize",
        message: format!(
            "no colorizer named {:?} (available: {})",
            name,
            names().collect::<Vec<_>>().join(", ")
        ),
    })
}

/// Hue at the start of the ramp: blue.
const RAMP_START: f64 = 2.0 / 3.0;

/// Log-normalized smoothed iteration count of a diverged point, in [0, 1].
///
/// Smooth coloring from https://mrob.com/pub/muency/continuousdwell.html
fn log_limited_count(point: &PointResult, limit: u32) -> f64 {
    let smoothed = point.iterations as f64 + 1.0 + point.last_modulus.log2().ln();
    (smoothed.ln() / (limit as f64 + 1.0).ln()).clamp(0.0, 1.0)
}

fn hsv(hue: f64, saturation: f64, value: f64) -> Result<Pixel, String> {
    Pixel::from_hsv(hue, saturation, value).map_err(|err| err.to_string())
}

/// Runs from blue toward red as points take longer to escape.
/// Bounded points are black.
#[derive(Debug, Default)]
pub struct Smooth {
    limit: u32,
}

impl Colorizer for Smooth {
    fn name(&self) -> &str {
        "smooth"
    }

    fn setup(&mut self, metadata: &FractalMetadata) -> Result<(), String> {
        self.limit = metadata.params.limit;
        Ok(())
    }

    fn colorize(&mut self, point: &PointResult) -> Result<Pixel, String> {
        if !point.diverged {
            return Ok(Pixel::BLACK);
        }
        let t = log_limited_count(point, self.limit);
        let hue = (RAMP_START * (1.0 - t)).rem_euclid(1.0);
        hsv(hue, 1.0, t)
    }
}

/// Goes around the color wheel `cycles` times.
///
/// With `avoid_purple`, the hue stays within blue..red,
/// restarting at blue instead of passing through purple.
#[derive(Debug)]
pub struct Bands {
    limit: u32,
    cycles: i64,
    avoid_purple: bool,
}

impl Default for Bands {
    fn default() -> Self {
        Bands {
            limit: 0,
            cycles: 3,
            avoid_purple: false,
        }
    }
}

const BANDS_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("cycles", ParamKind::Integer),
    ParamSpec::new("avoid_purple", ParamKind::Boolean),
];

impl Colorizer for Bands {
    fn name(&self) -> &str {
        "bands"
    }

    fn parameters(&self) -> &[ParamSpec] {
        BANDS_PARAMS
    }

    fn set_parameter(&mut self, name: &str, value: ArgValue) -> Result<(), String> {
        match (name, value) {
            ("cycles", ArgValue::Integer(v)) if v >= 1 => self.cycles = v,
            ("cycles", ArgValue::Integer(v)) => return Err(format!("must be at least 1, got {}", v)),
            ("avoid_purple", ArgValue::Boolean(v)) => self.avoid_purple = v,
            _ => return Err(format!("unexpected value {:?}", value)),
        }
        Ok(())
    }

    fn setup(&mut self, metadata: &FractalMetadata) -> Result<(), String> {
        self.limit = metadata.params.limit;
        Ok(())
    }

    fn colorize(&mut self, point: &PointResult) -> Result<Pixel, String> {
        if !point.diverged {
            return Ok(Pixel::BLACK);
        }
        let t = log_limited_count(point, self.limit);
        let turns = self.cycles as f64 * t;
        let hue = if self.avoid_purple {
            RAMP_START - turns % RAMP_START
        } else {
            (RAMP_START * (1.0 - turns)).rem_euclid(1.0)
        };
        hsv(hue, 1.0, t)
    }
}

/// Histogram-equalized coloring.
///
/// The pre-scan counts how many diverged points escaped at each iteration;
/// each point is then colored by the share of diverged points that escaped
/// no later than it did, so colors spread evenly over the image.
#[derive(Debug)]
pub struct Histogram {
    gamma: f64,
    invert: bool,
    limit: u32,
    /// Diverged points per iteration count. Only counts that occur are stored.
    counts: BTreeMap<u32, u64>,
    total: u64,
    cumulative: Option<BTreeMap<u32, f64>>,
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram {
            gamma: 1.0,
            invert: false,
            limit: 0,
            counts: BTreeMap::new(),
            total: 0,
            cumulative: None,
        }
    }
}

const HISTOGRAM_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("gamma", ParamKind::Float),
    ParamSpec::new("invert", ParamKind::Boolean),
];

impl Colorizer for Histogram {
    fn name(&self) -> &str {
        "histogram"
    }

    fn parameters(&self) -> &[ParamSpec] {
        HISTOGRAM_PARAMS
    }

    fn set_parameter(&mut self, name: &str, value: ArgValue) -> Result<(), String> {
        match (name, value) {
            ("gamma", ArgValue::Float(v)) if v > 0.0 => self.gamma = v,
            ("gamma", ArgValue::Float(v)) => return Err(format!("must be positive, got {}", v)),
            ("invert", ArgValue::Boolean(v)) => self.invert = v,
            _ => return Err(format!("unexpected value {:?}", value)),
        }
        Ok(())
    }

    fn setup(&mut self, metadata: &FractalMetadata) -> Result<(), String> {
        self.limit = metadata.params.limit;
        self.counts.clear();
        self.total = 0;
        self.cumulative = None;
        Ok(())
    }

    fn has_prepass(&self) -> bool {
        true
    }

    fn prepass(&mut self, point: &PointResult) -> Result<(), String> {
        if !point.diverged {
            return Ok(());
        }
        if point.iterations > self.limit {
            return Err(format!(
                "iteration count {} beyond limit {}",
                point.iterations, self.limit
            ));
        }
        *self.counts.entry(point.iterations).or_insert(0) += 1;
        self.total += 1;
        Ok(())
    }

    fn precolor(&mut self) -> Result<(), String> {
        let total = self.total.max(1) as f64;
        let mut running = 0;
        self.cumulative = Some(
            self.counts
                .iter()
                .map(|(&iterations, &count)| {
                    running += count;
                    (iterations, running as f64 / total)
                })
                .collect(),
        );
        tracing::debug!("histogram over {} diverged points", self.total);
        Ok(())
    }

    fn colorize(&mut self, point: &PointResult) -> Result<Pixel, String> {
        if !point.diverged {
            return Ok(Pixel::BLACK);
        }
        let cumulative = self
            .cumulative
            .as_ref()
            .ok_or_else(|| "colorize called before precolor".to_owned())?;
        // Share of diverged points that escaped no later than this one.
        let share = cumulative
            .range(..=point.iterations)
            .next_back()
            .map_or(0.0, |(_, share)| *share)
            .powf(self.gamma);
        let share = if self.invert { 1.0 - share } else { share };
        hsv(RAMP_START * (1.0 - share), 1.0, 1.0)
    }
}
