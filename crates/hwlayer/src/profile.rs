//! The hooks a tile pipeline calls: per-feature processing, relation
//! preprocessing and per-bucket post-processing.

use std::sync::Arc;

use geo::LineString;
use log::warn;

use crate::classify::{classify, SourceFeature};
use crate::emit::{emit_pair, FeatureSink, HIGHWAY_LAYER};
use crate::merge::MergeSettings;
use crate::tile::TileFeature;
use crate::zoom::ZoomLevel;

/// An OSM relation as seen by [`HighwayProfile::preprocess_osm_relation`].
#[derive(Debug, Clone, Default)]
pub struct OsmRelation {
    pub id: i64,
    pub tags: Vec<(String, String)>,
}

/// Relation data a profile asks the pipeline to keep for later lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub relation_id: i64,
}

/// Outcome of [`HighwayProfile::post_process_layer`].
#[derive(Debug)]
pub enum LayerOutput {
    /// The bucket was rewritten.
    Replaced(Vec<TileFeature>),
    /// The profile does not own this layer, or gave up; the input comes back as is.
    Unchanged(Vec<TileFeature>),
}

impl LayerOutput {
    pub fn into_features(self) -> Vec<TileFeature> {
        match self {
            LayerOutput::Replaced(features) | LayerOutput::Unchanged(features) => features,
        }
    }

    pub fn is_replaced(&self) -> bool {
        matches!(self, LayerOutput::Replaced(_))
    }
}

/// A map with a single `highway` layer of two-tone road lines.
#[derive(Debug, Clone, Default)]
pub struct HighwayProfile {
    merge: MergeSettings,
}

impl HighwayProfile {
    pub const NAME: &'static str = "SingleHighwayLayer";
    pub const DESCRIPTION: &'static str = "A map with a single highway layer";
    pub const ATTRIBUTION: &'static str = r#"<a href="https://www.openstreetmap.org/copyright" target="_blank">&copy; OpenStreetMap contributors</a>"#;

    pub fn new(merge: MergeSettings) -> Self {
        Self { merge }
    }

    pub fn merge_settings(&self) -> &MergeSettings {
        &self.merge
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    pub fn attribution(&self) -> &'static str {
        Self::ATTRIBUTION
    }

    /// No relation is of interest to this profile.
    pub fn preprocess_osm_relation(&self, _relation: &OsmRelation) -> Vec<RelationInfo> {
        Vec::new()
    }

    /// Classifies `feature` and emits its casing and fill records.
    /// Returns the number of records emitted: 0 or 2.
    pub fn process_feature<F, S>(
        &self,
        feature: &F,
        geometry: &Arc<LineString<f64>>,
        sink: &mut S,
    ) -> usize
    where
        F: SourceFeature + ?Sized,
        S: FeatureSink + ?Sized,
    {
        let Some(classified) = classify(feature) else {
            return 0;
        };

        emit_pair(&classified, geometry, sink);
        2
    }

    /// Merges the `highway` bucket for `zoom`; other layers pass through.
    /// A failed merge degrades to the unmerged bucket.
    pub fn post_process_layer(
        &self,
        layer: &str,
        zoom: ZoomLevel,
        features: Vec<TileFeature>,
    ) -> LayerOutput {
        if layer != HIGHWAY_LAYER {
            return LayerOutput::Unchanged(features);
        }

        match self.merge.merge(&features, zoom) {
            Ok(merged) => LayerOutput::Replaced(merged),
            Err(err) => {
                warn!("Leaving {layer} at {zoom} unmerged: {err}");
                LayerOutput::Unchanged(features)
            }
        }
    }
}
