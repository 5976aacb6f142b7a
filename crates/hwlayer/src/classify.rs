//! Matching source features to road categories.

use log::debug;

use crate::category::{CategoryStyle, RoadCategory};
use crate::zoom::{LineColor, LineSortKey, LineWidth, Stroke, ZoomLevel};

const LINK_SUFFIX: &str = "_link";

/// Read access to a source feature, as provided by the surrounding pipeline.
pub trait SourceFeature {
    /// Whether the geometry can be interpreted as a line.
    fn can_be_line(&self) -> bool;

    /// Value of `key`, if tagged.
    fn tag(&self, key: &str) -> Option<&str>;

    fn has_tag(&self, key: &str) -> bool {
        self.tag(key).is_some()
    }

    /// Whether `key` is tagged with one of `values`.
    fn has_tag_value(&self, key: &str, values: &[&str]) -> bool {
        self.tag(key).is_some_and(|value| values.iter().any(|v| *v == value))
    }
}

/// A feature matched to a category, with everything styling needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassifiedFeature {
    pub category: RoadCategory,
    pub link: bool,
    pub bridge: bool,
    pub tunnel: bool,
    pub layer: Option<i32>,
}

impl ClassifiedFeature {
    #[inline]
    pub fn style(&self) -> &'static CategoryStyle {
        self.category.style()
    }

    pub fn min_zoom(&self) -> ZoomLevel {
        ZoomLevel::clamped(self.style().min_zoom_for(self.link).into())
    }

    pub fn max_zoom(&self) -> ZoomLevel {
        ZoomLevel::MAX
    }

    pub fn line_width(&self, stroke: Stroke) -> LineWidth {
        LineWidth {
            levels: &self.style().width,
            stroke,
            link: self.link,
        }
    }

    pub fn line_color(&self, stroke: Stroke) -> LineColor {
        let style = self.style();
        let levels = match stroke {
            Stroke::Casing => &style.casing_color,
            Stroke::Fill => &style.fill_color,
        };

        LineColor {
            levels,
            stroke,
            tunnel: self.tunnel,
        }
    }

    pub fn line_sort_key(&self, stroke: Stroke) -> LineSortKey {
        LineSortKey {
            rank: self.category.rank(),
            stroke,
            link: self.link,
            bridge: self.bridge,
            tunnel: self.tunnel,
            layer: self.layer,
        }
    }
}

/// Splits a `highway=*` value into its category and link flag.
///
/// `unclassified` has no link variant, so `unclassified_link` does not match.
pub fn match_highway(value: &str) -> Option<(RoadCategory, bool)> {
    let (base, link) = match value.strip_suffix(LINK_SUFFIX) {
        Some(base) => (base, true),
        None => (value, false),
    };

    let category = RoadCategory::from_name(base)?;
    if link && !category.style().has_link() {
        return None;
    }

    Some((category, link))
}

pub fn is_tunnel<F: SourceFeature + ?Sized>(feature: &F) -> bool {
    feature.has_tag_value("tunnel", &["yes", "building_passage"])
        || feature.has_tag_value("covered", &["yes"])
}

pub fn is_bridge<F: SourceFeature + ?Sized>(feature: &F) -> bool {
    feature.has_tag("bridge")
}

/// Parses the `layer` tag. Anything that is not an integer counts as absent.
pub fn parse_layer<F: SourceFeature + ?Sized>(feature: &F) -> Option<i32> {
    let raw = feature.tag("layer")?;
    match raw.trim().parse::<i32>() {
        Ok(layer) => Some(layer),
        Err(_) => {
            debug!("Ignoring unparseable layer tag {raw:?}");
            None
        }
    }
}

/// Classifies a feature, or `None` when it is not one of the six road categories.
pub fn classify<F: SourceFeature + ?Sized>(feature: &F) -> Option<ClassifiedFeature> {
    if !feature.can_be_line() {
        return None;
    }

    let (category, link) = match_highway(feature.tag("highway")?)?;

    Some(ClassifiedFeature {
        category,
        link,
        bridge: is_bridge(feature),
        tunnel: is_tunnel(feature),
        layer: parse_layer(feature),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tags(&'static [(&'static str, &'static str)], bool);

    impl SourceFeature for Tags {
        fn can_be_line(&self) -> bool {
            self.1
        }

        fn tag(&self, key: &str) -> Option<&str> {
            self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
        }
    }

    #[test]
    fn highway_values() {
        assert_eq!(match_highway("motorway"), Some((RoadCategory::Motorway, false)));
        assert_eq!(match_highway("motorway_link"), Some((RoadCategory::Motorway, true)));
        assert_eq!(match_highway("tertiary_link"), Some((RoadCategory::Tertiary, true)));
        assert_eq!(match_highway("unclassified"), Some((RoadCategory::Unclassified, false)));
        assert_eq!(match_highway("unclassified_link"), None);
        assert_eq!(match_highway("residential"), None);
        assert_eq!(match_highway("_link"), None);
        assert_eq!(match_highway(" primary"), None);
    }

    #[test]
    fn flags_and_layer() {
        let feature = Tags(&[("highway", "primary"), ("bridge", "viaduct"), ("layer", " 2 ")], true);
        let classified = classify(&feature).unwrap();
        assert!(classified.bridge);
        assert!(!classified.tunnel);
        assert_eq!(classified.layer, Some(2));

        let passage = Tags(&[("highway", "trunk"), ("tunnel", "building_passage")], true);
        assert!(classify(&passage).unwrap().tunnel);

        let covered = Tags(&[("highway", "trunk"), ("covered", "yes"), ("layer", "minus one")], true);
        let classified = classify(&covered).unwrap();
        assert!(classified.tunnel);
        assert_eq!(classified.layer, None);

        let not_a_tunnel = Tags(&[("highway", "trunk"), ("tunnel", "no")], true);
        assert!(!classify(&not_a_tunnel).unwrap().tunnel);
    }

    #[test]
    fn non_lines_and_unknown_values_are_dropped() {
        assert_eq!(classify(&Tags(&[("highway", "primary")], false)), None);
        assert_eq!(classify(&Tags(&[("highway", "residential")], true)), None);
        assert_eq!(classify(&Tags(&[("railway", "rail")], true)), None);
    }

    #[test]
    fn min_zoom_follows_link_status() {
        let link = classify(&Tags(&[("highway", "secondary_link")], true)).unwrap();
        assert_eq!(link.min_zoom().get(), 11);
        let road = classify(&Tags(&[("highway", "secondary")], true)).unwrap();
        assert_eq!(road.min_zoom().get(), 9);
        assert_eq!(road.max_zoom(), ZoomLevel::MAX);
    }
}
