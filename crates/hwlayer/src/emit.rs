//! Turning a classified feature into its casing and fill records.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use geo::LineString;
use serde::Serialize;

use crate::classify::ClassifiedFeature;
use crate::zoom::{LineColor, LineSortKey, LineWidth, Stroke, ZoomLevel};

/// The only layer this profile writes.
pub const HIGHWAY_LAYER: &str = "highway";

pub const ATTR_SORT_KEY: &str = "line-sort-key";
pub const ATTR_COLOR: &str = "line-color";
pub const ATTR_WIDTH: &str = "line-width";
pub const ATTR_WIDTH_Z20: &str = "line-width-z20";

/// No minimum-size culling.
pub const MIN_PIXEL_SIZE: f64 = 0.0;

/// A resolved attribute value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(Cow<'static, str>),
}

// Floats compare by bit pattern so that attribute maps can key a hash map.
impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Float(a), AttrValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttrValue::Text(a), AttrValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            AttrValue::Int(v) => v.hash(state),
            AttrValue::Float(v) => v.to_bits().hash(state),
            AttrValue::Text(v) => v.hash(state),
        }
    }
}

/// Attributes of one tile feature, ordered by name.
pub type Attributes = BTreeMap<Cow<'static, str>, AttrValue>;

/// A zoom-indexed attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomFn {
    Width(LineWidth),
    Color(LineColor),
    SortKey(LineSortKey),
}

impl ZoomFn {
    pub fn eval(&self, zoom: ZoomLevel) -> AttrValue {
        match self {
            ZoomFn::Width(width) => AttrValue::Float(width.eval(zoom)),
            ZoomFn::Color(color) => AttrValue::Text(Cow::Borrowed(color.eval(zoom))),
            ZoomFn::SortKey(key) => AttrValue::Int(key.eval(zoom)),
        }
    }
}

/// An attribute as handed to the sink: constant or zoom-indexed.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Const(AttrValue),
    PerZoom(ZoomFn),
}

impl Attr {
    pub fn eval(&self, zoom: ZoomLevel) -> AttrValue {
        match self {
            Attr::Const(value) => value.clone(),
            Attr::PerZoom(function) => function.eval(zoom),
        }
    }
}

/// One output line of the highway layer, still zoom-independent.
#[derive(Debug, Clone)]
pub struct RenderedRecord {
    pub layer: &'static str,
    /// Shared with the source feature and the sibling record.
    pub geometry: Arc<LineString<f64>>,
    pub stroke: Stroke,
    pub sort_key: LineSortKey,
    pub color: LineColor,
    pub width: LineWidth,
    pub width_z20: f64,
    pub min_zoom: ZoomLevel,
    pub max_zoom: ZoomLevel,
    pub min_pixel_size: f64,
}

impl RenderedRecord {
    fn new(feature: &ClassifiedFeature, geometry: &Arc<LineString<f64>>, stroke: Stroke) -> Self {
        let width = feature.line_width(stroke);

        Self {
            layer: HIGHWAY_LAYER,
            geometry: Arc::clone(geometry),
            stroke,
            sort_key: feature.line_sort_key(stroke),
            color: feature.line_color(stroke),
            width,
            width_z20: width.at_extrapolated_zoom(),
            min_zoom: feature.min_zoom(),
            max_zoom: feature.max_zoom(),
            min_pixel_size: MIN_PIXEL_SIZE,
        }
    }

    #[inline]
    pub fn visible_at(&self, zoom: ZoomLevel) -> bool {
        self.min_zoom <= zoom && zoom <= self.max_zoom
    }

    /// The named attribute map, as a generic tile pipeline consumes it.
    pub fn attributes(&self) -> BTreeMap<&'static str, Attr> {
        BTreeMap::from([
            (ATTR_SORT_KEY, Attr::PerZoom(ZoomFn::SortKey(self.sort_key))),
            (ATTR_COLOR, Attr::PerZoom(ZoomFn::Color(self.color))),
            (ATTR_WIDTH, Attr::PerZoom(ZoomFn::Width(self.width))),
            (ATTR_WIDTH_Z20, Attr::Const(AttrValue::Float(self.width_z20))),
        ])
    }

    /// Attributes evaluated at `zoom`; `None` outside the record's zoom range,
    /// where the tables hold no meaningful values.
    pub fn attributes_at(&self, zoom: ZoomLevel) -> Option<Attributes> {
        if !self.visible_at(zoom) {
            return None;
        }

        Some(
            self.attributes()
                .into_iter()
                .map(|(name, attr)| (Cow::Borrowed(name), attr.eval(zoom)))
                .collect(),
        )
    }
}

/// Receives emitted records.
pub trait FeatureSink {
    fn line(&mut self, record: RenderedRecord);
}

/// Collects records in emission order.
#[derive(Debug, Default)]
pub struct FeatureCollector {
    records: Vec<RenderedRecord>,
}

impl FeatureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[RenderedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RenderedRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FeatureSink for FeatureCollector {
    fn line(&mut self, record: RenderedRecord) {
        self.records.push(record);
    }
}

/// Builds the casing and fill records of a feature, in that order.
pub fn render_pair(
    feature: &ClassifiedFeature,
    geometry: &Arc<LineString<f64>>,
) -> [RenderedRecord; 2] {
    [
        RenderedRecord::new(feature, geometry, Stroke::Casing),
        RenderedRecord::new(feature, geometry, Stroke::Fill),
    ]
}

/// Emits both records of a feature into `sink`.
pub fn emit_pair<S: FeatureSink + ?Sized>(
    feature: &ClassifiedFeature,
    geometry: &Arc<LineString<f64>>,
    sink: &mut S,
) {
    for record in render_pair(feature, geometry) {
        sink.line(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::RoadCategory;

    fn feature(category: RoadCategory, link: bool) -> ClassifiedFeature {
        ClassifiedFeature {
            category,
            link,
            bridge: false,
            tunnel: false,
            layer: None,
        }
    }

    fn geometry() -> Arc<LineString<f64>> {
        Arc::new(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]))
    }

    #[test]
    fn pair_shares_zoom_range_and_geometry() {
        let geometry = geometry();
        let [casing, fill] = render_pair(&feature(RoadCategory::Primary, true), &geometry);

        assert_eq!(casing.stroke, Stroke::Casing);
        assert_eq!(fill.stroke, Stroke::Fill);
        assert_eq!(casing.min_zoom, fill.min_zoom);
        assert_eq!(casing.max_zoom, fill.max_zoom);
        assert_eq!(casing.min_zoom.get(), 11);
        assert!(Arc::ptr_eq(&casing.geometry, &fill.geometry));
        assert_eq!(casing.width_z20, fill.width_z20 + 2.0);
        assert_eq!(fill.min_pixel_size, 0.0);
        assert_eq!(fill.layer, HIGHWAY_LAYER);
    }

    #[test]
    fn attributes_hidden_outside_zoom_range() {
        let [casing, _] = render_pair(&feature(RoadCategory::Unclassified, false), &geometry());

        assert!(casing.attributes_at(ZoomLevel::new(11).unwrap()).is_none());
        let attrs = casing.attributes_at(ZoomLevel::new(12).unwrap()).unwrap();
        assert_eq!(attrs[ATTR_COLOR], AttrValue::Text("#ccc".into()));
        assert_eq!(attrs[ATTR_WIDTH], AttrValue::Float(3.0));
        assert_eq!(attrs.len(), 4);
    }

    #[test]
    fn collector_keeps_emission_order() {
        let mut sink = FeatureCollector::new();
        emit_pair(&feature(RoadCategory::Trunk, false), &geometry(), &mut sink);

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[0].stroke, Stroke::Casing);
        assert_eq!(sink.records()[1].stroke, Stroke::Fill);
    }
}
