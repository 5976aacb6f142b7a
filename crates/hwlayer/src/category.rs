//! The six road categories and their zoom tables.

use std::fmt;

use crate::zoom::{ZoomTable, ZOOM_LEVELS};

/// Min zoom shared by every `*_link` variant except `tertiary_link`.
pub const LINK_MIN_ZOOM: u8 = 11;

/// Road categories in rank order. The discriminant is the rank and feeds
/// straight into sort-key arithmetic, so the order must never change.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoadCategory {
    Unclassified = 0,
    Tertiary = 1,
    Secondary = 2,
    Primary = 3,
    Trunk = 4,
    Motorway = 5,
}

impl RoadCategory {
    pub const ALL: [RoadCategory; 6] = [
        RoadCategory::Unclassified,
        RoadCategory::Tertiary,
        RoadCategory::Secondary,
        RoadCategory::Primary,
        RoadCategory::Trunk,
        RoadCategory::Motorway,
    ];

    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// The bare `highway=*` value.
    pub const fn name(self) -> &'static str {
        match self {
            RoadCategory::Unclassified => "unclassified",
            RoadCategory::Tertiary => "tertiary",
            RoadCategory::Secondary => "secondary",
            RoadCategory::Primary => "primary",
            RoadCategory::Trunk => "trunk",
            RoadCategory::Motorway => "motorway",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.name() == name)
    }

    #[inline]
    pub fn style(self) -> &'static CategoryStyle {
        &STYLES[self as usize]
    }
}

impl fmt::Display for RoadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static styling for one category.
#[derive(Debug)]
pub struct CategoryStyle {
    pub category: RoadCategory,
    pub min_zoom: u8,
    /// Min zoom of the `_link` variant; `None` when the category has none.
    pub link_min_zoom: Option<u8>,
    pub width: ZoomTable<f64>,
    pub casing_color: ZoomTable<&'static str>,
    pub fill_color: ZoomTable<&'static str>,
}

impl CategoryStyle {
    #[inline]
    pub fn has_link(&self) -> bool {
        self.link_min_zoom.is_some()
    }

    pub fn min_zoom_for(&self, link: bool) -> u8 {
        match (link, self.link_min_zoom) {
            (true, Some(link_min)) => link_min,
            _ => self.min_zoom,
        }
    }
}

/// `value` from `start` up, empty below.
const fn from_zoom(start: usize, value: &'static str) -> ZoomTable<&'static str> {
    let table = [""; ZOOM_LEVELS];
    then_from(table, start, value)
}

/// Overwrites `table` with `value` from `start` up.
const fn then_from(
    mut table: ZoomTable<&'static str>,
    start: usize,
    value: &'static str,
) -> ZoomTable<&'static str> {
    let mut zoom = start;
    while zoom < ZOOM_LEVELS {
        table[zoom] = value;
        zoom += 1;
    }
    table
}

/// Indexed by rank.
pub static STYLES: [CategoryStyle; RoadCategory::COUNT] = [
    CategoryStyle {
        category: RoadCategory::Unclassified,
        min_zoom: 12,
        link_min_zoom: None,
        //      z0   z1   z2   z3   z4   z5   z6   z7   z8   z9  z10  z11  z12  z13  z14
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.5, 2.0],
        casing_color: from_zoom(12, "#ccc"),
        fill_color: from_zoom(12, "white"),
    },
    CategoryStyle {
        category: RoadCategory::Tertiary,
        min_zoom: 10,
        link_min_zoom: Some(14),
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.5, 3.0],
        casing_color: then_from(from_zoom(10, "#ccc"), 12, "#bbb"),
        fill_color: from_zoom(10, "white"),
    },
    CategoryStyle {
        category: RoadCategory::Secondary,
        min_zoom: 9,
        link_min_zoom: Some(LINK_MIN_ZOOM),
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 2.5, 3.0, 3.5],
        casing_color: from_zoom(9, "#9b59b6"),
        fill_color: from_zoom(9, "white"),
    },
    CategoryStyle {
        category: RoadCategory::Primary,
        min_zoom: 8,
        link_min_zoom: Some(LINK_MIN_ZOOM),
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.5, 3.0, 3.5],
        casing_color: from_zoom(8, "#3498db"),
        fill_color: from_zoom(8, "white"),
    },
    CategoryStyle {
        category: RoadCategory::Trunk,
        min_zoom: 7,
        link_min_zoom: Some(LINK_MIN_ZOOM),
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5],
        casing_color: from_zoom(7, "#2ecc71"),
        fill_color: from_zoom(7, "white"),
    },
    CategoryStyle {
        category: RoadCategory::Motorway,
        min_zoom: 6,
        link_min_zoom: Some(LINK_MIN_ZOOM),
        width: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0],
        casing_color: from_zoom(6, "#fab724"),
        fill_color: from_zoom(6, "#feefc3"),
    },
];
