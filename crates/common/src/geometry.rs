//! Route geometry helpers: distances, bounds and fallback paths.

use geo::prelude::*;
use geo::{LineString, Point};
use serde::{Deserialize, Serialize};

use crate::coords::Coordinate;

/// Great-circle distance in metres.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// Total length in metres of a path, summed segment by segment.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Axis-aligned bounds of a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl BoundingBox {
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.south_west.longitude + self.north_east.longitude) / 2.0,
            (self.south_west.latitude + self.north_east.latitude) / 2.0,
        )
    }

    /// Grows the box by `ratio` of its size on every side.
    pub fn padded(&self, ratio: f64) -> Self {
        let dx = (self.north_east.longitude - self.south_west.longitude) * ratio;
        let dy = (self.north_east.latitude - self.south_west.latitude) * ratio;
        Self {
            south_west: Coordinate::new(self.south_west.longitude - dx, self.south_west.latitude - dy),
            north_east: Coordinate::new(self.north_east.longitude + dx, self.north_east.latitude + dy),
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south_west.longitude..=self.north_east.longitude).contains(&point.longitude)
            && (self.south_west.latitude..=self.north_east.latitude).contains(&point.latitude)
    }
}

/// Bounds of `points`, or `None` for an empty slice.
pub fn bounding_box(points: &[Coordinate]) -> Option<BoundingBox> {
    let line: LineString<f64> = points.iter().map(|&c| geo::Coord::from(c)).collect();
    let rect = line.bounding_rect()?;
    Some(BoundingBox {
        south_west: rect.min().into(),
        north_east: rect.max().into(),
    })
}

/// Two-point path used when no routed geometry is available.
pub fn straight_line(start: Coordinate, end: Coordinate) -> Vec<Coordinate> {
    vec![start, end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero_distance() {
        let p = Coordinate::new(-66.1568, -17.3895);
        assert_eq!(haversine_distance(p, p), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn path_length_sums_segments() {
        let path = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(0.0, 2.0),
        ];
        let whole = haversine_distance(path[0], path[2]);
        assert!((path_length(&path) - whole).abs() < 1e-6);
        assert_eq!(path_length(&path[..1]), 0.0);
    }

    #[test]
    fn bounding_box_spans_points() {
        let points = [
            Coordinate::new(-66.20, -17.35),
            Coordinate::new(-66.10, -17.45),
            Coordinate::new(-66.15, -17.40),
        ];
        let bbox = bounding_box(&points).unwrap();
        assert_eq!(bbox.south_west, Coordinate::new(-66.20, -17.45));
        assert_eq!(bbox.north_east, Coordinate::new(-66.10, -17.35));
        assert!(bbox.contains(points[2]));
        let center = bbox.center();
        assert!((center.longitude + 66.15).abs() < 1e-9);
        assert!((center.latitude + 17.40).abs() < 1e-9);
    }

    #[test]
    fn empty_points_have_no_bounds() {
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn padding_grows_the_box() {
        let bbox = BoundingBox {
            south_west: Coordinate::new(0.0, 0.0),
            north_east: Coordinate::new(2.0, 4.0),
        };
        let padded = bbox.padded(0.5);
        assert_eq!(padded.south_west, Coordinate::new(-1.0, -2.0));
        assert_eq!(padded.north_east, Coordinate::new(3.0, 6.0));
    }
}
