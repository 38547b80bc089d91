//! Escape-time evaluation of the Mandelbrot fractal.

use num::complex::Complex64;

use crate::PointResult;

/// Evaluate a single point of the Mandelbrot set.
///
/// Iterates z <- z^2 + point from z = 0 until |z| exceeds `escape_radius`
/// or `limit` iterations have been completed.
/// `iterations` counts the iterations completed before the escape,
/// so a point that starts outside the radius reports 0.
///
/// This is a pure function; it is called concurrently from every worker.
#[inline]
pub fn evaluate(point: Complex64, limit: u32, escape_radius: f64) -> PointResult {
    let mut z = Complex64::new(0.0, 0.0);
    let mut modulus = 0.0;
    let mut iterations = 0;

    while iterations < limit {
        z = z * z + point;
        modulus = z.norm();

        if modulus > escape_radius {
            return PointResult {
                last_value: z,
                last_modulus: modulus,
                iterations,
                diverged: true,
            };
        }
        iterations += 1;
    }

    PointResult {
        last_value: z,
        last_modulus: modulus,
        iterations,
        diverged: false,
    }
}
