//! hwlayer: a single `highway` vector tile layer built from OSM road ways.
//!
//! Pipeline, per source feature:
//!
//! 1. [`classify()`] matches `highway=*` against six ranked categories
//!    (`unclassified` < `tertiary` < `secondary` < `primary` < `trunk` <
//!    `motorway`) and their `_link` variants, and reads the bridge, tunnel and
//!    `layer` tags.
//! 2. [`emit`] produces two records sharing the source geometry, a casing
//!    and a fill, each carrying zoom-indexed attributes from [`zoom`].
//! 3. Once every record of a tile is collected, [`merge`] coalesces
//!    attribute-identical lines per (layer, zoom) bucket.
//!
//! Attributes written per record:
//!
//! | name             | kind              | notes                                   |
//! |------------------|-------------------|-----------------------------------------|
//! | `line-sort-key`  | per zoom, integer | draw order; higher draws on top         |
//! | `line-color`     | per zoom, string  | tunnel palette from z14                 |
//! | `line-width`     | per zoom, float   | casing +2.0, link -1.5                  |
//! | `line-width-z20` | constant, float   | 5 x (z14 width - link offset), casing +2 |
//!
//! Zoom levels run 0..=14. Every record is visible from its category's min
//! zoom up to 14 and has no minimum pixel size.

pub mod category;
pub mod classify;
pub mod emit;
pub mod error;
pub mod merge;
pub mod profile;
pub mod tile;
pub mod zoom;

pub use category::{CategoryStyle, RoadCategory, LINK_MIN_ZOOM, STYLES};
pub use classify::{classify, ClassifiedFeature, SourceFeature};
pub use emit::{
    emit_pair, render_pair, Attr, AttrValue, Attributes, FeatureCollector, FeatureSink,
    RenderedRecord, ZoomFn, HIGHWAY_LAYER,
};
pub use error::{Error, Result};
pub use merge::{merge_line_strings, MergeSettings};
pub use profile::{HighwayProfile, LayerOutput, OsmRelation, RelationInfo};
pub use tile::TileFeature;
pub use zoom::{LineColor, LineSortKey, LineWidth, Stroke, ZoomLevel, ZoomTable, MAX_ZOOM};
