//! Zoom levels and the three zoom-indexed line functions.
//!
//! Each function is a plain value holding what it captured at emission time
//! (category rank, flags, layer, table reference) and evaluates lazily for one
//! zoom level at a time.

use std::fmt;

use crate::category::RoadCategory;
use crate::error::{Error, Result};

/// Highest zoom level with a table entry.
pub const MAX_ZOOM: u8 = 14;

/// Number of entries in every [`ZoomTable`].
pub const ZOOM_LEVELS: usize = MAX_ZOOM as usize + 1;

/// Synthetic zoom the `line-width-z20` attribute is extrapolated to.
pub const EXTRAPOLATED_ZOOM: u8 = 20;

/// From this zoom on, tunnels switch to the tunnel palette and the sort key
/// carries vertical layering.
pub const TUNNEL_AND_BRIDGE_MIN_ZOOM: u8 = 14;

/// Casing color for tunnels at [`TUNNEL_AND_BRIDGE_MIN_ZOOM`] and above.
pub const TUNNEL_CASING_COLOR: &str = "#C5C5C5";

/// Fill color for tunnels at [`TUNNEL_AND_BRIDGE_MIN_ZOOM`] and above.
pub const TUNNEL_FILL_COLOR: &str = "#e4e4e4";

const CASING_EXTRA_WIDTH: f64 = 2.0;
const LINK_WIDTH_REDUCTION: f64 = 1.5;
const Z20_WIDTH_SCALE: f64 = 5.0;

/// One value per zoom level `0..=MAX_ZOOM`.
pub type ZoomTable<T> = [T; ZOOM_LEVELS];

/// A validated zoom level in `0..=MAX_ZOOM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(MAX_ZOOM);

    /// Rejects zooms outside `0..=MAX_ZOOM`.
    pub fn new(zoom: u8) -> Result<Self> {
        if zoom > MAX_ZOOM {
            return Err(Error::ZoomOutOfRange { zoom: zoom.into() });
        }

        Ok(Self(zoom))
    }

    /// Clamps any integer into `0..=MAX_ZOOM`.
    pub fn clamped(zoom: i64) -> Self {
        Self(zoom.clamp(0, MAX_ZOOM.into()) as u8)
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every zoom level from `min` to `max`, inclusive.
    pub fn range(min: Self, max: Self) -> impl Iterator<Item = Self> {
        (min.0..=max.0).map(Self)
    }
}

impl TryFrom<u8> for ZoomLevel {
    type Error = Error;

    fn try_from(zoom: u8) -> Result<Self> {
        Self::new(zoom)
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "z{}", self.0)
    }
}

/// Which half of the two-tone stroke a record draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stroke {
    /// The wider background line.
    Casing,
    /// The narrower foreground line.
    Fill,
}

impl Stroke {
    #[inline]
    pub const fn is_casing(self) -> bool {
        matches!(self, Stroke::Casing)
    }
}

/// `line-width`: table value, widened for casings, narrowed for links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineWidth {
    pub levels: &'static ZoomTable<f64>,
    pub stroke: Stroke,
    pub link: bool,
}

impl LineWidth {
    pub fn eval(&self, zoom: ZoomLevel) -> f64 {
        let mut width = self.levels[zoom.index()];
        if self.stroke.is_casing() {
            width += CASING_EXTRA_WIDTH;
        }
        if self.link {
            width -= LINK_WIDTH_REDUCTION;
        }
        width
    }

    /// Linear extrapolation of the zoom 14 width to [`EXTRAPOLATED_ZOOM`].
    pub fn at_extrapolated_zoom(&self) -> f64 {
        let link_offset = if self.link { LINK_WIDTH_REDUCTION } else { 0.0 };
        let fill = Z20_WIDTH_SCALE * (self.levels[MAX_ZOOM as usize] - link_offset);

        match self.stroke {
            Stroke::Casing => fill + CASING_EXTRA_WIDTH,
            Stroke::Fill => fill,
        }
    }
}

/// `line-color`: table value, except tunnels at high zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineColor {
    pub levels: &'static ZoomTable<&'static str>,
    pub stroke: Stroke,
    pub tunnel: bool,
}

impl LineColor {
    pub fn eval(&self, zoom: ZoomLevel) -> &'static str {
        if self.tunnel && zoom.get() >= TUNNEL_AND_BRIDGE_MIN_ZOOM {
            return match self.stroke {
                Stroke::Casing => TUNNEL_CASING_COLOR,
                Stroke::Fill => TUNNEL_FILL_COLOR,
            };
        }

        self.levels[zoom.index()]
    }
}

/// `line-sort-key`: packs rank, stroke, link and vertical layering into
/// disjoint magnitude bands.
///
/// Below zoom 14 the bands are, from least to most significant: stroke (1),
/// rank (2), link (2N). From zoom 14: rank (1), link (N), stroke (2N) and
/// finally bridge/tunnel layering (4N), where N is the number of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineSortKey {
    pub rank: u8,
    pub stroke: Stroke,
    pub link: bool,
    pub bridge: bool,
    pub tunnel: bool,
    /// Raw `layer` tag; defaults are applied here, not at parse time.
    pub layer: Option<i32>,
}

impl LineSortKey {
    pub fn eval(&self, zoom: ZoomLevel) -> i64 {
        const N: i64 = RoadCategory::COUNT as i64;

        let rank = i64::from(self.rank);
        let fill = i64::from(!self.stroke.is_casing());
        let non_link = i64::from(!self.link);

        if zoom.get() < TUNNEL_AND_BRIDGE_MIN_ZOOM {
            return 2 * rank + fill + non_link * 2 * N;
        }

        let mut key = rank + fill * 2 * N + non_link * N;
        if self.bridge {
            key += i64::from(self.layer.unwrap_or(1)) * 4 * N;
        }
        if self.tunnel {
            key += i64::from(self.layer.unwrap_or(-1)) * 4 * N;
        }
        key
    }
}
