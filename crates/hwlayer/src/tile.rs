//! Records resolved for one tile at one zoom: the input and output of the
//! per-bucket merge.

use std::borrow::Cow;

use geo::MultiLineString;

use crate::emit::{Attributes, RenderedRecord};
use crate::zoom::ZoomLevel;

/// A feature as it sits in one tile at one zoom: resolved attributes and
/// tile-space line geometry. This is what the post-process hook consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub layer: Cow<'static, str>,
    pub geometry: MultiLineString<f64>,
    pub attributes: Attributes,
}

impl TileFeature {
    pub fn new(
        layer: impl Into<Cow<'static, str>>,
        geometry: MultiLineString<f64>,
        attributes: Attributes,
    ) -> Self {
        Self {
            layer: layer.into(),
            geometry,
            attributes,
        }
    }

    /// Evaluates `record` at `zoom` with an already projected (and possibly
    /// clipped) geometry. Returns `None` when the record is not visible at
    /// that zoom or nothing of the geometry is left.
    pub fn from_record(
        record: &RenderedRecord,
        zoom: ZoomLevel,
        geometry: impl Into<MultiLineString<f64>>,
    ) -> Option<Self> {
        let geometry = geometry.into();
        if geometry.0.iter().all(|line| line.0.is_empty()) {
            return None;
        }

        let attributes = record.attributes_at(zoom)?;
        Some(Self::new(record.layer, geometry, attributes))
    }

    pub fn line_count(&self) -> usize {
        self.geometry.0.len()
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.geometry
            .iter()
            .flat_map(|line| line.coords())
            .all(|c| c.x.is_finite() && c.y.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::RoadCategory;
    use crate::classify::ClassifiedFeature;
    use crate::emit::render_pair;
    use geo::LineString;
    use std::sync::Arc;

    fn casing() -> RenderedRecord {
        let feature = ClassifiedFeature {
            category: RoadCategory::Primary,
            link: false,
            bridge: false,
            tunnel: false,
            layer: None,
        };
        let geometry = Arc::new(LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]));
        let [casing, _fill] = render_pair(&feature, &geometry);
        casing
    }

    #[test]
    fn keeps_every_clipped_piece() {
        let zoom = ZoomLevel::new(10).unwrap();
        let pieces = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 0.0), (5.0, 0.0)]),
            LineString::from(vec![(9.0, 0.0), (12.0, 0.0)]),
        ]);

        let feature = TileFeature::from_record(&casing(), zoom, pieces).unwrap();
        assert_eq!(feature.line_count(), 2);
        assert_eq!(feature.layer, "highway");
    }

    #[test]
    fn nothing_left_after_clipping_means_no_feature() {
        let zoom = ZoomLevel::new(10).unwrap();

        assert!(TileFeature::from_record(&casing(), zoom, MultiLineString::new(vec![])).is_none());
        // Below primary's min zoom.
        let line = LineString::from(vec![(0.0, 0.0), (5.0, 0.0)]);
        assert!(TileFeature::from_record(&casing(), ZoomLevel::new(7).unwrap(), line).is_none());
    }
}
