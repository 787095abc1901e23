use std::f64::consts::TAU;

use clap::ValueEnum;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::SampledFunction;
use crate::core::frequency::FrequencyStrategy;
use crate::settings::IntegrationPrecision;

/// Built-in closed paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Star,
    Lissajous,
}

impl Shape {
    pub fn name(self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Square => "square",
            Shape::Triangle => "triangle",
            Shape::Star => "star",
            Shape::Lissajous => "lissajous",
        }
    }

    pub fn point(self, t: f64) -> Complex64 {
        let t = t.rem_euclid(1.0);
        match self {
            Shape::Circle => Complex64::from_polar(1.0, TAU * t),
            Shape::Square => polygon_point(&regular_polygon(4, 1.0, TAU / 8.0), t),
            Shape::Triangle => polygon_point(&regular_polygon(3, 1.0, TAU / 4.0), t),
            Shape::Star => polygon_point(&star_vertices(5, 1.0, 0.4), t),
            Shape::Lissajous => Complex64::new((3.0 * TAU * t).sin(), (2.0 * TAU * t).sin()),
        }
    }

    pub fn function(self, precision: IntegrationPrecision) -> SampledFunction {
        SampledFunction::new(self.name(), move |t| self.point(t), precision)
            .with_default_strategy(FrequencyStrategy::default())
    }
}

fn regular_polygon(sides: usize, radius: f64, rotation: f64) -> Vec<Complex64> {
    (0..sides)
        .map(|k| Complex64::from_polar(radius, rotation + TAU * k as f64 / sides as f64))
        .collect()
}

fn star_vertices(points: usize, outer: f64, inner: f64) -> Vec<Complex64> {
    let n = points * 2;
    (0..n)
        .map(|k| {
            let r = if k % 2 == 0 { outer } else { inner };
            Complex64::from_polar(r, TAU / 4.0 + TAU * k as f64 / n as f64)
        })
        .collect()
}

/// Piecewise-linear walk over the closed polygon, equal time per edge.
fn polygon_point(vertices: &[Complex64], t: f64) -> Complex64 {
    let n = vertices.len();
    let pos = t * n as f64;
    let edge = (pos.floor() as usize).min(n - 1);
    let frac = pos - edge as f64;
    let a = vertices[edge];
    let b = vertices[(edge + 1) % n];
    a + (b - a) * frac
}
