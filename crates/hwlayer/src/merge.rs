//! Per-tile coalescing of attribute-identical line features.
//!
//! Features are grouped by layer and attribute map in order of first
//! appearance, so draw order between groups never changes. Within a group,
//! line strings whose endpoints lie within `max_gap` of each other are joined,
//! the result is simplified (Douglas-Peucker) and anything shorter than
//! `min_length` is dropped. Each group yields at most one multi-line feature.

use std::collections::HashMap;

use geo::{Coord, EuclideanLength, LineString, MultiLineString, Simplify};
use log::debug;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::emit::Attributes;
use crate::error::{Error, Result};
use crate::tile::TileFeature;
use crate::zoom::ZoomLevel;

/// Merge parameters, in tile pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeSettings {
    /// Merged lines shorter than this are dropped.
    pub min_length: f64,
    /// Simplification tolerance below `fine_tolerance_from`.
    pub coarse_tolerance: f64,
    /// Simplification tolerance from `fine_tolerance_from` on.
    pub fine_tolerance: f64,
    pub fine_tolerance_from: u8,
    /// Largest endpoint gap that still joins two lines.
    pub max_gap: f64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            min_length: 0.5,
            coarse_tolerance: 0.5,
            fine_tolerance: 0.1,
            fine_tolerance_from: 13,
            max_gap: 4.0,
        }
    }
}

impl MergeSettings {
    pub fn tolerance(&self, zoom: ZoomLevel) -> f64 {
        if zoom.get() < self.fine_tolerance_from {
            self.coarse_tolerance
        } else {
            self.fine_tolerance
        }
    }

    /// Merges one (layer, zoom) bucket with the tolerance for `zoom`.
    pub fn merge(&self, features: &[TileFeature], zoom: ZoomLevel) -> Result<Vec<TileFeature>> {
        merge_line_strings(features, self.min_length, self.tolerance(zoom), self.max_gap)
    }
}

struct Group<'a> {
    feature: &'a TileFeature,
    lines: Vec<LineString<f64>>,
}

/// Coalesces `features`; see the module docs. Fails on non-finite
/// coordinates, leaving the caller to decide how to degrade.
pub fn merge_line_strings(
    features: &[TileFeature],
    min_length: f64,
    tolerance: f64,
    max_gap: f64,
) -> Result<Vec<TileFeature>> {
    let mut slots: HashMap<(&str, &Attributes), usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        if !feature.is_finite() {
            return Err(Error::NonFiniteCoordinate {
                layer: feature.layer.to_string(),
                feature: index,
            });
        }

        let slot = *slots
            .entry((feature.layer.as_ref(), &feature.attributes))
            .or_insert_with(|| {
                groups.push(Group { feature, lines: Vec::new() });
                groups.len() - 1
            });

        groups[slot]
            .lines
            .extend(feature.geometry.iter().filter(|line| line.0.len() >= 2).cloned());
    }

    let mut merged = Vec::with_capacity(groups.len());
    let mut lines_in = 0usize;
    let mut lines_out = 0usize;

    for group in groups {
        lines_in += group.lines.len();

        let lines: Vec<LineString<f64>> = join_lines(group.lines, max_gap)
            .into_iter()
            .map(|line| if tolerance > 0.0 { line.simplify(&tolerance) } else { line })
            .filter(|line| line.euclidean_length() >= min_length)
            .collect();

        if lines.is_empty() {
            continue;
        }

        lines_out += lines.len();
        merged.push(TileFeature {
            layer: group.feature.layer.clone(),
            geometry: MultiLineString::new(lines),
            attributes: group.feature.attributes.clone(),
        });
    }

    debug!(
        "Merged {} features ({} lines) into {} features ({} lines)",
        features.len(),
        lines_in,
        merged.len(),
        lines_out
    );

    Ok(merged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Head,
    Tail,
}

type Endpoint = GeomWithData<[f64; 2], (usize, End)>;

fn endpoints(line: usize, coords: &[Coord<f64>]) -> Vec<Endpoint> {
    let (Some(head), Some(tail)) = (coords.first(), coords.last()) else {
        return Vec::new();
    };

    vec![
        GeomWithData::new([head.x, head.y], (line, End::Head)),
        GeomWithData::new([tail.x, tail.y], (line, End::Tail)),
    ]
}

fn remove_endpoints(index: &mut RTree<Endpoint>, line: usize, coords: &[Coord<f64>]) {
    for endpoint in endpoints(line, coords) {
        index.remove(&endpoint);
    }
}

/// Greedily chains lines end to end, flipping them where needed.
fn join_lines(lines: Vec<LineString<f64>>, max_gap: f64) -> Vec<LineString<f64>> {
    let mut pending: Vec<Option<Vec<Coord<f64>>>> =
        lines.into_iter().map(|line| Some(line.0)).collect();

    let mut index = RTree::bulk_load(
        pending
            .iter()
            .enumerate()
            .filter_map(|(line, coords)| coords.as_deref().map(|c| endpoints(line, c)))
            .flatten()
            .collect(),
    );

    let mut joined = Vec::with_capacity(pending.len());
    for line in 0..pending.len() {
        let Some(mut coords) = pending[line].take() else {
            continue;
        };
        remove_endpoints(&mut index, line, &coords);

        extend_tail(&mut coords, &mut pending, &mut index, max_gap);
        coords.reverse();
        extend_tail(&mut coords, &mut pending, &mut index, max_gap);
        coords.reverse();

        joined.push(LineString::new(coords));
    }

    joined
}

fn extend_tail(
    coords: &mut Vec<Coord<f64>>,
    pending: &mut [Option<Vec<Coord<f64>>>],
    index: &mut RTree<Endpoint>,
    max_gap: f64,
) {
    let max_gap_sq = max_gap * max_gap;

    while let Some(&tail) = coords.last() {
        let Some(&(other, end)) = index
            .nearest_neighbor(&[tail.x, tail.y])
            .filter(|candidate| {
                let [x, y] = *candidate.geom();
                (x - tail.x).powi(2) + (y - tail.y).powi(2) <= max_gap_sq
            })
            .map(|candidate| &candidate.data)
        else {
            return;
        };

        let Some(mut next) = pending[other].take() else {
            return;
        };
        remove_endpoints(index, other, &next);

        if end == End::Tail {
            next.reverse();
        }
        let skip = usize::from(next.first() == Some(&tail));
        coords.extend_from_slice(&next[skip..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::AttrValue;
    use std::borrow::Cow;

    fn attrs(color: &'static str) -> Attributes {
        Attributes::from([(Cow::Borrowed("line-color"), AttrValue::Text(Cow::Borrowed(color)))])
    }

    fn feature(color: &'static str, points: &[(f64, f64)]) -> TileFeature {
        TileFeature::new(
            "highway",
            MultiLineString::new(vec![LineString::from(points.to_vec())]),
            attrs(color),
        )
    }

    fn coords(line: &LineString<f64>) -> Vec<(f64, f64)> {
        line.coords().map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn joins_touching_lines() {
        let merged = merge_line_strings(
            &[
                feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("white", &[(10.0, 0.0), (10.0, 10.0)]),
            ],
            0.5,
            0.1,
            4.0,
        )
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].line_count(), 1);
        assert_eq!(coords(&merged[0].geometry.0[0]), vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn flips_lines_meeting_tail_to_tail() {
        let merged = merge_line_strings(
            &[
                feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("white", &[(10.0, 10.0), (10.0, 0.0)]),
            ],
            0.5,
            0.1,
            4.0,
        )
        .unwrap();

        assert_eq!(coords(&merged[0].geometry.0[0]), vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    }

    #[test]
    fn bridges_small_gaps_only() {
        let merged = merge_line_strings(
            &[
                feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("white", &[(13.0, 0.0), (20.0, 0.0)]),
                feature("white", &[(25.0, 0.0), (30.0, 0.0)]),
            ],
            0.5,
            0.5,
            4.0,
        )
        .unwrap();

        assert_eq!(merged.len(), 1);
        let lines = &merged[0].geometry.0;
        assert_eq!(lines.len(), 2);
        assert_eq!(coords(&lines[0]), vec![(0.0, 0.0), (20.0, 0.0)]);
        assert_eq!(coords(&lines[1]), vec![(25.0, 0.0), (30.0, 0.0)]);
    }

    #[test]
    fn keeps_group_order_and_attributes_apart() {
        let merged = merge_line_strings(
            &[
                feature("#ccc", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("#ccc", &[(10.0, 0.0), (20.0, 0.0)]),
            ],
            0.5,
            0.1,
            4.0,
        )
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].attributes, attrs("#ccc"));
        assert_eq!(merged[1].attributes, attrs("white"));
        // Joined, then the collinear midpoint is simplified away.
        assert_eq!(coords(&merged[0].geometry.0[0]), vec![(0.0, 0.0), (20.0, 0.0)]);
    }

    #[test]
    fn drops_short_lines_and_simplifies() {
        let merged = merge_line_strings(
            &[
                feature("white", &[(0.0, 0.0), (0.2, 0.2)]),
                feature("#ccc", &[(0.0, 0.0), (5.0, 0.05), (10.0, 0.0)]),
            ],
            0.5,
            0.1,
            0.0,
        )
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].attributes, attrs("#ccc"));
        assert_eq!(coords(&merged[0].geometry.0[0]), vec![(0.0, 0.0), (10.0, 0.0)]);
    }

    #[test]
    fn merging_twice_changes_nothing() {
        let input = vec![
            feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
            feature("#ccc", &[(50.0, 50.0), (60.0, 52.0), (70.0, 50.0)]),
            feature("white", &[(12.0, 1.0), (20.0, 3.0), (30.0, 0.0)]),
            feature("white", &[(30.0, 0.0), (30.0, 30.0)]),
            feature("white", &[(100.0, 0.0), (110.0, 0.0)]),
        ];
        let settings = MergeSettings::default();
        let zoom = ZoomLevel::new(14).unwrap();

        let once = settings.merge(&input, zoom).unwrap();
        let twice = settings.merge(&once, zoom).unwrap();

        assert!(once.len() <= input.len());
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let result = merge_line_strings(
            &[
                feature("white", &[(0.0, 0.0), (10.0, 0.0)]),
                feature("white", &[(f64::NAN, 0.0), (10.0, 0.0)]),
            ],
            0.5,
            0.1,
            4.0,
        );

        assert!(matches!(result, Err(Error::NonFiniteCoordinate { feature: 1, .. })));
    }

    #[test]
    fn tolerance_by_zoom() {
        let settings = MergeSettings::default();
        assert_eq!(settings.tolerance(ZoomLevel::new(12).unwrap()), 0.5);
        assert_eq!(settings.tolerance(ZoomLevel::new(13).unwrap()), 0.1);
        assert_eq!(settings.tolerance(ZoomLevel::MAX), 0.1);
    }
}
