use bevy::prelude::*;
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::wrap_index;

const DEFAULT_TABLE_SIZE: usize = 100;
const MIN_OPEN_POINTS: usize = 4;
const MIN_LOOPED_POINTS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplineError {
    #[error("a {kind} spline needs at least {required} control points, got {actual}")]
    TooFewPoints {
        kind: &'static str,
        required: usize,
        actual: usize,
    },
    #[error("the arc-length table needs at least 2 samples, got {0}")]
    TableTooSmall(usize),
}

/// One sample of the arc-length table: the curve parameter and the
/// distance travelled along the curve to reach it.
#[derive(Debug, Copy, Clone, PartialEq, Reflect)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ArcLengthSample {
    pub t: f32,
    pub arc_length: f32,
}

/// A Catmull-Rom spline through a list of control points. Positions can be
/// sampled by curve parameter ([Self::uniform_position]) or by distance along
/// the curve ([Self::geodesic_position_by_distance]), the latter moving at a
/// constant speed regardless of how the control points are spaced.
///
/// An open spline uses its first and last control points only to shape the
/// tangents at either end; the curve itself runs from the second to the
/// second-to-last point. A looped spline passes through every point and
/// closes back on the first.
#[derive(Component, Debug, Clone)]
pub struct CatmullRomSpline {
    points: Vec<Vec3>,
    looped: bool,
    table_size: usize,
    table: Vec<ArcLengthSample>,
}

impl CatmullRomSpline {
    pub fn new(points: Vec<Vec3>, looped: bool) -> Result<Self, SplineError> {
        Self::check_points(&points, looped)?;
        let mut spline = Self {
            points,
            looped,
            table_size: DEFAULT_TABLE_SIZE,
            table: Vec::new(),
        };
        spline.rebuild_table();
        Ok(spline)
    }

    /// Set how many samples the arc-length table holds. More samples give
    /// a more even speed along the curve at the cost of slower lookups.
    pub fn with_table_size(mut self, table_size: usize) -> Result<Self, SplineError> {
        self.set_table_size(table_size)?;
        Ok(self)
    }

    pub fn set_table_size(&mut self, table_size: usize) -> Result<(), SplineError> {
        if table_size < 2 {
            return Err(SplineError::TableTooSmall(table_size));
        }
        if table_size != self.table_size {
            self.table_size = table_size;
            self.rebuild_table();
        }
        Ok(())
    }

    pub fn set_points(&mut self, points: Vec<Vec3>) -> Result<(), SplineError> {
        Self::check_points(&points, self.looped)?;
        self.points = points;
        self.rebuild_table();
        Ok(())
    }

    pub fn set_looped(&mut self, looped: bool) -> Result<(), SplineError> {
        Self::check_points(&self.points, looped)?;
        if looped != self.looped {
            self.looped = looped;
            self.rebuild_table();
        }
        Ok(())
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn arc_length_table(&self) -> &[ArcLengthSample] {
        &self.table
    }

    /// The length of the curve, measured along the arc-length table.
    pub fn total_length(&self) -> f32 {
        self.table.last().map_or(0.0, |sample| sample.arc_length)
    }

    /// Sample the curve by parameter `t` in `[0, 1]`. Equal steps of `t`
    /// cover one segment each in equal time, so travel speed depends on
    /// segment length.
    pub fn uniform_position(&self, t: f32) -> Vec3 {
        let segments = self.segment_count();
        let scaled = t.clamp(0.0, 1.0) * segments as f32;
        let segment = (scaled.floor() as usize).min(segments - 1);
        let u = scaled - segment as f32;

        let index = (segment + self.start_index()) as isize;
        let [p0, p1, p2, p3] = [index - 1, index, index + 1, index + 2]
            .map(|i| self.points[wrap_index(i, self.points.len())]);
        catmull_rom(u, p0, p1, p2, p3)
    }

    /// Sample the curve at `distance` along its length.
    pub fn geodesic_position_by_distance(&self, distance: f32) -> Vec3 {
        self.uniform_position(self.t_from_distance(distance))
    }

    /// Sample the curve at `percent` (in `[0, 1]`) of its length.
    pub fn geodesic_position_by_percentage(&self, percent: f32) -> Vec3 {
        self.geodesic_position_by_distance(self.total_length() * percent)
    }

    fn segment_count(&self) -> usize {
        if self.looped {
            self.points.len()
        } else {
            self.points.len() - 3
        }
    }

    fn start_index(&self) -> usize {
        if self.looped { 0 } else { 1 }
    }

    fn check_points(points: &[Vec3], looped: bool) -> Result<(), SplineError> {
        let (kind, required) = if looped {
            ("looped", MIN_LOOPED_POINTS)
        } else {
            ("open", MIN_OPEN_POINTS)
        };
        if points.len() < required {
            return Err(SplineError::TooFewPoints {
                kind,
                required,
                actual: points.len(),
            });
        }
        Ok(())
    }

    fn rebuild_table(&mut self) {
        let last = (self.table_size - 1) as f32;
        let mut table = Vec::with_capacity(self.table_size);
        let mut distance = 0.0;
        let mut previous = self.uniform_position(0.0);
        for i in 0..self.table_size {
            let t = i as f32 / last;
            let position = self.uniform_position(t);
            distance += position.distance(previous);
            previous = position;
            table.push(ArcLengthSample {
                t,
                arc_length: distance,
            });
        }
        self.table = table;
        if self.total_length() <= 0.0 {
            warn!("Catmull-Rom spline has zero length; all control points coincide");
        }
    }

    fn t_from_distance(&self, distance: f32) -> f32 {
        let distance = distance.clamp(0.0, self.total_length());
        let bracket = self
            .table
            .windows(2)
            .find(|pair| distance <= pair[1].arc_length);
        let Some([from, to]) = bracket.map(|pair| [pair[0], pair[1]]) else {
            return 0.0;
        };
        let span = to.arc_length - from.arc_length;
        let blend = if span > 0.0 {
            ((distance - from.arc_length) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        from.t + (to.t - from.t) * blend
    }
}

/// Evaluate one Catmull-Rom segment between `p1` and `p2`. `p0` and `p3`
/// only shape the tangents.
pub fn catmull_rom(u: f32, p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Vec3 {
    let uu = u * u;
    let uuu = uu * u;

    let f0 = -0.5 * uuu + uu - 0.5 * u;
    let f1 = 1.5 * uuu - 2.5 * uu + 1.0;
    let f2 = -1.5 * uuu + 2.0 * uu + 0.5 * u;
    let f3 = 0.5 * uuu - 0.5 * uu;

    p0 * f0 + p1 * f1 + p2 * f2 + p3 * f3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(count: usize) -> Vec<Vec3> {
        (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    fn wavy() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 2.0),
            Vec3::new(4.0, 0.0, 2.5),
            Vec3::new(5.0, 1.0, -1.0),
            Vec3::new(9.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_catmull_rom_endpoints() {
        let p = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE];
        assert!(catmull_rom(0.0, p[0], p[1], p[2], p[3]).abs_diff_eq(p[1], 0.0001));
        assert!(catmull_rom(1.0, p[0], p[1], p[2], p[3]).abs_diff_eq(p[2], 0.0001));
    }

    #[test]
    fn test_too_few_points() {
        assert_eq!(
            CatmullRomSpline::new(line(3), false).unwrap_err(),
            SplineError::TooFewPoints {
                kind: "open",
                required: 4,
                actual: 3
            }
        );
        assert!(CatmullRomSpline::new(line(3), true).is_ok());
        assert!(CatmullRomSpline::new(line(2), true).is_err());
    }

    #[test]
    fn test_open_spline_skips_anchor_points() {
        let spline = CatmullRomSpline::new(wavy(), false).unwrap();
        assert!(spline.uniform_position(0.0).abs_diff_eq(wavy()[1], 0.0001));
        assert!(spline.uniform_position(0.5).abs_diff_eq(wavy()[2], 0.0001));
        assert!(spline.uniform_position(1.0).abs_diff_eq(wavy()[3], 0.0001));
    }

    #[test]
    fn test_looped_spline_closes() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let spline = CatmullRomSpline::new(points.clone(), true).unwrap();
        assert!(spline.uniform_position(0.0).abs_diff_eq(points[0], 0.0001));
        assert!(spline.uniform_position(0.25).abs_diff_eq(points[1], 0.0001));
        assert!(spline.uniform_position(1.0).abs_diff_eq(points[0], 0.0001));
    }

    #[test]
    fn test_straight_line_length() {
        let spline = CatmullRomSpline::new(line(5), false).unwrap();
        // The curve runs from x=1 to x=3 on evenly spaced collinear points.
        assert!((spline.total_length() - 2.0).abs() < 0.001);
        let halfway = spline.geodesic_position_by_percentage(0.5);
        assert!(halfway.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 0.01));
    }

    #[test]
    fn test_geodesic_round_trip() {
        let spline = CatmullRomSpline::new(wavy(), false).unwrap();
        let start = spline.geodesic_position_by_distance(0.0);
        let end = spline.geodesic_position_by_distance(spline.total_length());
        assert!(start.abs_diff_eq(spline.uniform_position(0.0), 0.001));
        assert!(end.abs_diff_eq(spline.uniform_position(1.0), 0.001));
    }

    #[test]
    fn test_geodesic_is_uniform_speed() {
        let spline = CatmullRomSpline::new(wavy(), false)
            .unwrap()
            .with_table_size(1000)
            .unwrap();
        let step = spline.total_length() / 20.0;
        let samples: Vec<_> = (0..=20)
            .map(|i| spline.geodesic_position_by_distance(i as f32 * step))
            .collect();
        for pair in samples.windows(2) {
            let travelled = pair[0].distance(pair[1]);
            // Chords are a little shorter than arcs on curved sections.
            assert!(
                (travelled - step).abs() < step * 0.1,
                "Expected step close to {}, got {}",
                step,
                travelled
            );
        }
    }

    #[test]
    fn test_table_rebuilds_on_resize() {
        let mut spline = CatmullRomSpline::new(wavy(), false).unwrap();
        assert_eq!(spline.arc_length_table().len(), 100);
        spline.set_table_size(250).unwrap();
        assert_eq!(spline.arc_length_table().len(), 250);
        assert_eq!(spline.arc_length_table()[0].t, 0.0);
        assert_eq!(spline.arc_length_table()[249].t, 1.0);
        assert_eq!(
            spline.set_table_size(1).unwrap_err(),
            SplineError::TableTooSmall(1)
        );
        assert_eq!(spline.table_size(), 250);
    }

    #[test]
    fn test_table_rebuilds_on_new_points() {
        let mut spline = CatmullRomSpline::new(line(5), false).unwrap();
        let before = spline.total_length();
        spline
            .set_points(line(5).into_iter().map(|p| p * 2.0).collect())
            .unwrap();
        assert!((spline.total_length() - before * 2.0).abs() < 0.001);
    }
}
