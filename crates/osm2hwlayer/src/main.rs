use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

// OSM / geometry utilities
use geo::{Coord, LineString};
use osmpbf::{Element, ElementReader};
use serde::Serialize;

// Highway profile
use hwlayer::{
    Attributes, FeatureCollector, HighwayProfile, MergeSettings, OsmRelation, RelationInfo, RenderedRecord,
    SourceFeature, TileFeature, ZoomLevel, HIGHWAY_LAYER, MAX_ZOOM,
};

mod mercator;

use mercator::{clip_to_tile, covering_tiles, to_tile_pixels, world_coord, TileCoord};

#[derive(Parser, Debug, Clone)]
#[command(name = "osm2hwlayer", version, about = HighwayProfile::DESCRIPTION)]
struct Args {
    /// Extract name; selects the default input `data/sources/<area>.osm.pbf`.
    #[arg(long, env = "HWLAYER_AREA", default_value = "monaco")]
    area: String,

    /// OSM .pbf input; overrides the path derived from --area.
    #[arg(long, env = "HWLAYER_INPUT")]
    input: Option<PathBuf>,

    /// Newline-delimited JSON output, one object per non-empty tile.
    #[arg(long, env = "HWLAYER_OUTPUT", default_value = "data/single-highway-layer.ndjson")]
    output: PathBuf,

    #[arg(long, default_value_t = 0)]
    min_zoom: u8,

    /// Values above 14 are clamped to 14.
    #[arg(long, default_value_t = MAX_ZOOM)]
    max_zoom: u8,

    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Log a progress line every N elements (nodes/ways). Default: 2,000,000
    #[arg(long, default_value_t = 2_000_000)]
    log_every: usize,

    /// Tile pixel extent the merge tolerances are measured in.
    #[arg(long, default_value_t = 256.0)]
    tile_extent: f64,

    /// Pixels kept around each tile when clipping lines.
    #[arg(long, default_value_t = 4.0)]
    tile_buffer: f64,

    /// Merged lines shorter than this many pixels are dropped.
    #[arg(long, default_value_t = 0.5)]
    merge_min_length: f64,

    /// Largest endpoint gap, in pixels, that still joins two lines.
    #[arg(long, default_value_t = 4.0)]
    merge_max_gap: f64,

    /// Simplification tolerance below --fine-from-zoom.
    #[arg(long, default_value_t = 0.5)]
    simplify_coarse: f64,

    /// Simplification tolerance from --fine-from-zoom on.
    #[arg(long, default_value_t = 0.1)]
    simplify_fine: f64,

    #[arg(long, default_value_t = 13)]
    fine_from_zoom: u8,
}

impl Args {
    fn input_path(&self) -> PathBuf {
        self.input.clone().unwrap_or_else(|| {
            Path::new("data")
                .join("sources")
                .join(format!("{}.osm.pbf", self.area))
        })
    }

    /// Validated `(min, max)` zoom range.
    fn zoom_range(&self) -> Result<(ZoomLevel, ZoomLevel)> {
        let max = ZoomLevel::clamped(self.max_zoom.into());
        if max.get() != self.max_zoom {
            warn!("--max-zoom {} clamped to {}", self.max_zoom, max.get());
        }

        let min = ZoomLevel::new(self.min_zoom)
            .with_context(|| format!("invalid --min-zoom {}", self.min_zoom))?;
        if min > max {
            bail!("--min-zoom {} is above --max-zoom {}", min.get(), max.get());
        }

        Ok((min, max))
    }

    fn merge_settings(&self) -> Result<MergeSettings> {
        let lengths = [
            ("--merge-min-length", self.merge_min_length),
            ("--merge-max-gap", self.merge_max_gap),
            ("--simplify-coarse", self.simplify_coarse),
            ("--simplify-fine", self.simplify_fine),
            ("--tile-buffer", self.tile_buffer),
        ];
        for (flag, value) in lengths {
            if !(value.is_finite() && value >= 0.0) {
                bail!("{flag} must be a non-negative number, got {value}");
            }
        }

        Ok(MergeSettings {
            min_length: self.merge_min_length,
            coarse_tolerance: self.simplify_coarse,
            fine_tolerance: self.simplify_fine,
            fine_tolerance_from: self.fine_from_zoom,
            max_gap: self.merge_max_gap,
        })
    }
}

/// Rate-limited progress lines for one pass over the PBF file.
struct Progress {
    pass: &'static str,
    every: usize,
    started: Instant,
    logged: Instant,
}

impl Progress {
    const MIN_GAP: Duration = Duration::from_millis(200);

    fn new(pass: &'static str, every: usize) -> Self {
        let now = Instant::now();
        Self {
            pass,
            every: every.max(1),
            started: now,
            logged: now,
        }
    }

    /// Logs on every `every`-th element, at most once per [`Self::MIN_GAP`].
    /// `detail` is only evaluated when a line is written.
    #[inline]
    fn observe(&mut self, count: usize, detail: impl FnOnce() -> String) {
        if count % self.every != 0 || self.logged.elapsed() < Self::MIN_GAP {
            return;
        }

        info!(
            "{}: {:>11} elements{}, {:5.2} M/s",
            self.pass,
            count,
            detail(),
            self.million_per_sec(count)
        );
        self.logged = Instant::now();
    }

    fn finish(&self, count: usize) {
        info!(
            "{} done: {} elements in {:.2?} ({:.2} M/s)",
            self.pass,
            count,
            self.started.elapsed(),
            self.million_per_sec(count)
        );
    }

    fn million_per_sec(&self, count: usize) -> f64 {
        count as f64 / 1e6 / self.started.elapsed().as_secs_f64().max(1e-9)
    }
}

// ==============================
// ===  OSM ways as features  ===
// ==============================

/// Borrowed view of a way's tags and resolved node count.
struct WayFeature<'a> {
    tags: Vec<(&'a str, &'a str)>,
    resolved_nodes: usize,
}

impl SourceFeature for WayFeature<'_> {
    fn can_be_line(&self) -> bool {
        self.resolved_nodes >= 2
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|(k, v)| if *k == key { Some(*v) } else { None })
    }
}

type NodeMap = hashbrown::HashMap<i64, Coord<f64>, nohash_hasher::BuildNoHashHasher<i64>>;

/// Pass A: every node, projected to world coordinates.
fn read_nodes(pbf_path: &Path, log_every: usize) -> Result<NodeMap> {
    let mut node_map = NodeMap::with_hasher(nohash_hasher::BuildNoHashHasher::default());
    let mut progress = Progress::new("Pass A (nodes)", log_every);

    ElementReader::from_path(pbf_path)
        .with_context(|| format!("opening {}", pbf_path.display()))?
        .for_each(|element| {
            let (id, lon, lat) = match element {
                Element::Node(node) => (node.id(), node.lon(), node.lat()),
                Element::DenseNode(node) => (node.id(), node.lon(), node.lat()),
                _ => return,
            };

            node_map.insert(id, world_coord(lon, lat));
            progress.observe(node_map.len(), String::new);
        })?;

    progress.finish(node_map.len());
    Ok(node_map)
}

#[derive(Debug, Default)]
struct WayStats {
    seen: usize,
    highways: usize,
    unresolved: usize,
    relations: usize,
}

/// Pass B: run every highway way through the profile.
fn read_ways(
    pbf_path: &Path,
    nodes: &NodeMap,
    profile: &HighwayProfile,
    log_every: usize,
) -> Result<(Vec<RenderedRecord>, Vec<RelationInfo>, WayStats)> {
    let mut collector = FeatureCollector::new();
    let mut relation_info = Vec::new();
    let mut stats = WayStats::default();
    let mut progress = Progress::new("Pass B (ways)", log_every);

    ElementReader::from_path(pbf_path)
        .with_context(|| format!("opening {}", pbf_path.display()))?
        .for_each(|element| match element {
            Element::Way(way) => {
                stats.seen += 1;

                let tags: Vec<(&str, &str)> = way.tags().collect();
                if tags.iter().any(|(k, _)| *k == "highway") {
                    stats.highways += 1;

                    let coords: Vec<Coord<f64>> =
                        way.refs().filter_map(|id| nodes.get(&id).copied()).collect();
                    if coords.len() < way.refs().len() {
                        stats.unresolved += 1;
                    }

                    let feature = WayFeature {
                        tags,
                        resolved_nodes: coords.len(),
                    };
                    let geometry = Arc::new(LineString::new(coords));
                    profile.process_feature(&feature, &geometry, &mut collector);
                }

                progress.observe(stats.seen, || format!(", {} records", collector.len()));
            }
            Element::Relation(relation) => {
                stats.relations += 1;

                let relation = OsmRelation {
                    id: relation.id(),
                    tags: relation
                        .tags()
                        .map(|(k, v)| (k.to_owned(), v.to_owned()))
                        .collect(),
                };
                relation_info.extend(profile.preprocess_osm_relation(&relation));
            }
            _ => {}
        })?;

    progress.finish(stats.seen);
    Ok((collector.into_records(), relation_info, stats))
}

// ==============================
// ===  Tiling and merging    ===
// ==============================

/// Places every record visible at `zoom` into the tiles it touches, clipped
/// to the tile plus `buffer` pixels.
/// Buckets come back sorted by tile; features keep emission order.
fn bucket_records(
    records: &[RenderedRecord],
    zoom: ZoomLevel,
    extent: f64,
    buffer: f64,
) -> Vec<(TileCoord, Vec<TileFeature>)> {
    let mut buckets: hashbrown::HashMap<TileCoord, Vec<TileFeature>> = hashbrown::HashMap::new();

    for record in records.iter().filter(|record| record.visible_at(zoom)) {
        for tile in covering_tiles(&record.geometry, zoom) {
            let pixels = to_tile_pixels(&record.geometry, zoom, tile, extent);
            let clipped = clip_to_tile(pixels, extent, buffer);
            if let Some(feature) = TileFeature::from_record(record, zoom, clipped) {
                buckets.entry(tile).or_default().push(feature);
            }
        }
    }

    let mut buckets: Vec<_> = buckets.into_iter().collect();
    buckets.sort_unstable_by_key(|(tile, _)| *tile);
    buckets
}

#[derive(Serialize)]
struct TileRecord<'a> {
    z: u8,
    x: u32,
    y: u32,
    layer: &'a str,
    features: Vec<FeatureRecord<'a>>,
}

#[derive(Serialize)]
struct FeatureRecord<'a> {
    attributes: &'a Attributes,
    geometry: Vec<Vec<[f64; 2]>>,
}

fn write_tile<W: Write>(
    out: &mut W,
    zoom: ZoomLevel,
    tile: TileCoord,
    features: &[TileFeature],
) -> Result<()> {
    let record = TileRecord {
        z: zoom.get(),
        x: tile.x,
        y: tile.y,
        layer: HIGHWAY_LAYER,
        features: features
            .iter()
            .map(|feature| FeatureRecord {
                attributes: &feature.attributes,
                geometry: feature
                    .geometry
                    .iter()
                    .map(|line| line.coords().map(|c| [c.x, c.y]).collect())
                    .collect(),
            })
            .collect(),
    };

    serde_json::to_writer(&mut *out, &record)?;
    out.write_all(b"\n")?;

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let (min_zoom, max_zoom) = args.zoom_range()?;
    if !(args.tile_extent.is_finite() && args.tile_extent > 0.0) {
        bail!("--tile-extent must be a positive number, got {}", args.tile_extent);
    }

    let input = args.input_path();
    if !input.exists() {
        bail!(
            "{} not found; place the '{}' extract there or pass --input",
            input.display(),
            args.area
        );
    }

    if args.output.exists() && !args.overwrite {
        bail!("{} already exists; pass --overwrite to replace it", args.output.display());
    }
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let profile = HighwayProfile::new(args.merge_settings()?);
    info!("{}: {}", profile.name(), profile.description());
    debug!("Merge settings: {:?}", profile.merge_settings());
    debug!("Attribution: {}", profile.attribution());

    let nodes = read_nodes(&input, args.log_every)?;

    let (records, relation_info, stats) = read_ways(&input, &nodes, &profile, args.log_every)?;
    drop(nodes);
    info!(
        "{} ways, {} highways ({} with missing nodes), {} records, {} relations ({} kept)",
        stats.seen,
        stats.highways,
        stats.unresolved,
        records.len(),
        stats.relations,
        relation_info.len()
    );

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut out = BufWriter::new(file);

    for zoom in ZoomLevel::range(min_zoom, max_zoom) {
        let started = Instant::now();
        let buckets = bucket_records(&records, zoom, args.tile_extent, args.tile_buffer);
        let features_in: usize = buckets.iter().map(|(_, features)| features.len()).sum();

        // Buckets are independent; each merge is single-threaded.
        let tiles: Vec<(TileCoord, Vec<TileFeature>)> = buckets
            .into_par_iter()
            .map(|(tile, features)| {
                let merged = profile
                    .post_process_layer(HIGHWAY_LAYER, zoom, features)
                    .into_features();
                (tile, merged)
            })
            .filter(|(_, features)| !features.is_empty())
            .collect();

        let features_out: usize = tiles.iter().map(|(_, features)| features.len()).sum();
        for (tile, features) in &tiles {
            write_tile(&mut out, zoom, *tile, features)?;
        }

        info!(
            "{zoom}: {} tiles, {} -> {} features in {:.2?}",
            tiles.len(),
            features_in,
            features_out,
            started.elapsed()
        );
    }

    out.flush()?;
    info!("OK {} -> {}", input.display(), args.output.display());

    Ok(())
}
