//! Web Mercator projection and tile addressing.
//!
//! World coordinates are normalised to `[0, 1]` on both axes, with `y`
//! growing southwards as in tile rows.

use std::f64::consts::PI;

use geo::{BooleanOps, Coord, LineString, MultiLineString, Rect};
use hwlayer::ZoomLevel;
use serde::Serialize;
use smallvec::SmallVec;

/// Latitude at which the square Web Mercator world ends.
pub const MAX_LATITUDE_DEG: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

/// Projects lon/lat degrees to normalised world coordinates.
#[inline]
pub fn world_coord(lon_deg: f64, lat_deg: f64) -> Coord<f64> {
    let lat = lat_deg.clamp(-MAX_LATITUDE_DEG, MAX_LATITUDE_DEG).to_radians();

    Coord {
        x: (lon_deg + 180.0) / 360.0,
        y: 0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI),
    }
}

#[inline]
fn tiles_per_side(zoom: ZoomLevel) -> f64 {
    f64::from(1u32 << zoom.get())
}

/// The tile containing a world coordinate.
pub fn tile_of(world: Coord<f64>, zoom: ZoomLevel) -> TileCoord {
    let n = tiles_per_side(zoom);
    let max = n - 1.0;

    TileCoord {
        x: (world.x * n).floor().clamp(0.0, max) as u32,
        y: (world.y * n).floor().clamp(0.0, max) as u32,
    }
}

/// Tiles touched by a world-space line, sorted and deduplicated.
pub fn covering_tiles(line: &LineString<f64>, zoom: ZoomLevel) -> SmallVec<[TileCoord; 4]> {
    let n = tiles_per_side(zoom);
    let mut tiles = SmallVec::<[TileCoord; 4]>::new();

    for segment in line.lines() {
        walk_segment(segment.start * n, segment.end * n, n, &mut tiles);
    }
    if tiles.is_empty() {
        if let Some(&only) = line.0.first() {
            tiles.push(tile_of(only, zoom));
        }
    }

    tiles.sort_unstable();
    tiles.dedup();
    tiles
}

/// Grid traversal in tile units: visits every cell the segment `a -> b`
/// passes through, stepping across one cell border at a time.
fn walk_segment(a: Coord<f64>, b: Coord<f64>, n: f64, tiles: &mut SmallVec<[TileCoord; 4]>) {
    let max = n - 1.0;
    let cell = |v: f64| v.floor().clamp(0.0, max);

    let (mut x, mut y) = (cell(a.x), cell(a.y));
    let (end_x, end_y) = (cell(b.x), cell(b.y));
    let d = b - a;

    // Parameter t in [0, 1] at which the next x / y border is crossed.
    let (step_x, mut next_x, delta_x) = axis(a.x, x, d.x);
    let (step_y, mut next_y, delta_y) = axis(a.y, y, d.y);

    let mut push = |x: f64, y: f64| {
        let tile = TileCoord { x: x as u32, y: y as u32 };
        if tiles.last() != Some(&tile) {
            tiles.push(tile);
        }
    };

    push(x, y);
    // Each step moves one axis strictly towards its end cell.
    while (x, y) != (end_x, end_y) {
        if x != end_x && (y == end_y || next_x <= next_y) {
            x += step_x;
            next_x += delta_x;
        } else {
            y += step_y;
            next_y += delta_y;
        }
        push(x, y);
    }
}

/// `(step, t of first border crossing, t per cell)` along one axis.
fn axis(start: f64, cell: f64, delta: f64) -> (f64, f64, f64) {
    if delta > 0.0 {
        (1.0, (cell + 1.0 - start) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        (-1.0, (start - cell) / -delta, -1.0 / delta)
    } else {
        (0.0, f64::INFINITY, f64::INFINITY)
    }
}

/// Re-expresses a world-space line in the pixel space of `tile`.
pub fn to_tile_pixels(
    line: &LineString<f64>,
    zoom: ZoomLevel,
    tile: TileCoord,
    extent: f64,
) -> LineString<f64> {
    let n = tiles_per_side(zoom);
    let (tx, ty) = (f64::from(tile.x), f64::from(tile.y));

    line.coords()
        .map(|c| Coord {
            x: (c.x * n - tx) * extent,
            y: (c.y * n - ty) * extent,
        })
        .collect()
}

/// Clips a tile-pixel line to the tile square grown by `buffer` on each side.
/// The result may hold several pieces, or none.
pub fn clip_to_tile(line: LineString<f64>, extent: f64, buffer: f64) -> MultiLineString<f64> {
    let bounds = Rect::new(
        Coord { x: -buffer, y: -buffer },
        Coord { x: extent + buffer, y: extent + buffer },
    );

    bounds
        .to_polygon()
        .clip(&MultiLineString::new(vec![line]), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_origin_and_clamps_poles() {
        let origin = world_coord(0.0, 0.0);
        assert!((origin.x - 0.5).abs() < 1e-12);
        assert!((origin.y - 0.5).abs() < 1e-12);

        let north = world_coord(-180.0, 90.0);
        assert_eq!(north.x, 0.0);
        assert!(north.y.abs() < 1e-9);
    }

    #[test]
    fn finds_tiles_along_a_line() {
        let zoom = ZoomLevel::new(1).unwrap();
        let line = LineString::from(vec![(0.1, 0.1), (0.9, 0.1)]);

        let tiles = covering_tiles(&line, zoom);
        assert_eq!(tiles.as_slice(), &[TileCoord { x: 0, y: 0 }, TileCoord { x: 1, y: 0 }]);
    }

    #[test]
    fn finds_tiles_cut_only_at_a_corner() {
        // Crosses tile (1, 1) for x in [0.5, 0.51] only.
        let zoom = ZoomLevel::new(1).unwrap();
        let line = LineString::from(vec![(0.2, 0.81), (0.81, 0.2)]);

        let tiles = covering_tiles(&line, zoom);
        assert_eq!(
            tiles.as_slice(),
            &[
                TileCoord { x: 0, y: 1 },
                TileCoord { x: 1, y: 0 },
                TileCoord { x: 1, y: 1 },
            ]
        );
    }

    #[test]
    fn walks_every_tile_of_a_long_diagonal() {
        let zoom = ZoomLevel::new(4).unwrap();
        let line = LineString::from(vec![(0.01, 0.02), (0.97, 0.99)]);

        let tiles = covering_tiles(&line, zoom);
        assert!(tiles.contains(&TileCoord { x: 0, y: 0 }));
        assert!(tiles.contains(&TileCoord { x: 15, y: 15 }));
        // 4-connected path from corner to corner.
        assert_eq!(tiles.len(), 31);
    }

    #[test]
    fn single_point_lines_still_have_a_tile() {
        let zoom = ZoomLevel::new(2).unwrap();
        let line = LineString::from(vec![(0.6, 0.1)]);

        assert_eq!(covering_tiles(&line, zoom).as_slice(), &[TileCoord { x: 2, y: 0 }]);
    }

    #[test]
    fn pixel_space_is_tile_relative() {
        let zoom = ZoomLevel::new(1).unwrap();
        let line = LineString::from(vec![(0.5, 0.25), (0.75, 0.5)]);

        let pixels = to_tile_pixels(&line, zoom, TileCoord { x: 1, y: 0 }, 256.0);
        let coords: Vec<(f64, f64)> = pixels.coords().map(|c| (c.x, c.y)).collect();
        assert_eq!(coords, vec![(0.0, 128.0), (128.0, 256.0)]);
    }

    #[test]
    fn clips_to_the_buffered_tile() {
        let line = LineString::from(vec![(-100.0, 128.0), (356.0, 128.0)]);

        let clipped = clip_to_tile(line, 256.0, 4.0);
        assert_eq!(clipped.0.len(), 1);

        let xs: Vec<f64> = clipped.0[0].coords().map(|c| c.x).collect();
        let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((min + 4.0).abs() < 1e-6, "{xs:?}");
        assert!((max - 260.0).abs() < 1e-6, "{xs:?}");
        assert!(clipped.0[0].coords().all(|c| (c.y - 128.0).abs() < 1e-6));
    }

    #[test]
    fn clipping_drops_lines_outside_the_buffer() {
        let line = LineString::from(vec![(300.0, 10.0), (400.0, 10.0)]);

        assert!(clip_to_tile(line, 256.0, 4.0).0.is_empty());
    }
}
