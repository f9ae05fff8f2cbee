use geo::{BoundingRect, Intersects, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::area_code_db::AreaCodeTable;
use super::AreaResolver;
use crate::config::PolygonConfig;
use crate::coord_transform;
use crate::error::{ConfigError, ResolveError};
use crate::route::{CoordinateSystem, GeoPoint, ResolvedPlace};

#[derive(Debug, Clone)]
pub struct BoundaryPolygon {
    pub region_id: String,
    pub shape: MultiPolygon<f64>,
}

/// The polygons of one boundary file, in file order.
#[derive(Debug, Clone)]
pub struct BoundaryCollection {
    pub source: String,
    pub polygons: Vec<BoundaryPolygon>,
}

impl BoundaryCollection {
    pub fn parse(
        source: &str,
        content: &str,
        region_id_property: &str,
    ) -> Result<BoundaryCollection, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBoundary {
            source_name: source.to_string(),
            reason,
        };
        let collection = match content.parse::<GeoJson>() {
            Ok(GeoJson::FeatureCollection(collection)) => collection,
            Ok(_) => return Err(invalid("expected a FeatureCollection".to_string())),
            Err(e) => return Err(invalid(e.to_string())),
        };

        let mut polygons = Vec::new();
        for (i, feature) in collection.features.into_iter().enumerate() {
            let region_id = match feature.property(region_id_property) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(invalid(format!(
                        "feature {i} has no `{region_id_property}` property"
                    )))
                }
            };
            let geometry = match feature.geometry {
                Some(geometry) => geometry,
                None => {
                    warn!("{}: feature {} ({}) has no geometry", source, i, region_id);
                    continue;
                }
            };
            let shape = match to_multi_polygon(geometry.value) {
                Some(shape) => shape,
                None => {
                    warn!(
                        "{}: feature {} ({}) is not a polygon, skipped",
                        source, i, region_id
                    );
                    continue;
                }
            };
            polygons.push(BoundaryPolygon { region_id, shape });
        }

        Ok(BoundaryCollection {
            source: source.to_string(),
            polygons,
        })
    }

    /// Loads every `.json`/`.geojson` file in `dir`, sorted by file name.
    /// The order is the match priority.
    pub fn load_dir(
        dir: &Path,
        region_id_property: &str,
    ) -> Result<Vec<BoundaryCollection>, ConfigError> {
        if !dir.is_dir() {
            return Err(ConfigError::MissingBoundaryDir(dir.to_path_buf()));
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_geojson = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("geojson"))
                .unwrap_or(false);
            if path.is_file() && is_geojson {
                files.push(path);
            }
        }
        files.sort();

        let mut collections = Vec::with_capacity(files.len());
        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = fs::read_to_string(&path)?;
            let collection = Self::parse(&name, &content, region_id_property)?;
            debug!("{}: {} polygons", name, collection.polygons.len());
            collections.push(collection);
        }
        Ok(collections)
    }
}

fn to_multi_polygon(value: geojson::Value) -> Option<MultiPolygon<f64>> {
    match value {
        geojson::Value::Polygon(_) => {
            let polygon: Polygon<f64> = value.try_into().ok()?;
            Some(MultiPolygon::new(vec![polygon]))
        }
        geojson::Value::MultiPolygon(_) => value.try_into().ok(),
        _ => None,
    }
}

// Only the bounding box goes into the tree. `rank` is the position in load
// order and points back into `PolygonAreaResolver::polygons`.
struct IndexedPolygon {
    rank: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Offline resolver: finds the boundary polygon containing the point and
/// looks its region id up in the reference table. When polygons overlap, the
/// one loaded first wins.
pub struct PolygonAreaResolver {
    polygons: Vec<BoundaryPolygon>,
    index: RTree<IndexedPolygon>,
    table: AreaCodeTable,
    system: CoordinateSystem,
}

impl PolygonAreaResolver {
    pub fn new(
        collections: Vec<BoundaryCollection>,
        table: AreaCodeTable,
        system: CoordinateSystem,
    ) -> PolygonAreaResolver {
        let polygons: Vec<BoundaryPolygon> = collections
            .into_iter()
            .flat_map(|c| c.polygons)
            .collect();
        let indexed = polygons
            .iter()
            .enumerate()
            .filter_map(|(rank, polygon)| {
                let rect = polygon.shape.bounding_rect()?;
                Some(IndexedPolygon {
                    rank,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        PolygonAreaResolver {
            polygons,
            index: RTree::bulk_load(indexed),
            table,
            system,
        }
    }

    pub fn from_config(config: &PolygonConfig) -> Result<PolygonAreaResolver, ConfigError> {
        let collections =
            BoundaryCollection::load_dir(&config.boundary_dir, &config.region_id_property)?;
        let table = AreaCodeTable::open(&config.reference_db)?;
        let resolver = Self::new(collections, table, config.boundary_system);
        info!(
            "polygon resolver ready: {} polygons, {} area codes, boundaries in {}",
            resolver.polygons.len(),
            resolver.table.len(),
            resolver.system
        );
        Ok(resolver)
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Load-order rank of the first polygon containing `point`, which must
    /// already be in the boundary system.
    fn locate(&self, point: GeoPoint) -> Option<usize> {
        let query = Point::new(point.longitude, point.latitude);
        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&AABB::from_point([point.longitude, point.latitude]))
            .filter(|candidate| self.polygons[candidate.rank].shape.intersects(&query))
            .map(|candidate| candidate.rank)
            .collect();
        hits.sort_unstable();
        if hits.len() > 1 {
            debug!(
                "({}, {}) is inside {} polygons: {:?}, using {}",
                point.longitude,
                point.latitude,
                hits.len(),
                hits.iter()
                    .map(|rank| self.polygons[*rank].region_id.as_str())
                    .collect::<Vec<_>>(),
                self.polygons[hits[0]].region_id
            );
        }
        hits.first().copied()
    }
}

impl AreaResolver for PolygonAreaResolver {
    fn name(&self) -> &str {
        "polygon"
    }

    fn resolve(
        &self,
        point: GeoPoint,
        system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError> {
        let query = coord_transform::transform(point, system, self.system);
        let rank = self.locate(query).ok_or_else(|| {
            ResolveError::unresolved(point.longitude, point.latitude, "outside all boundaries")
        })?;
        let region_id = &self.polygons[rank].region_id;
        match self.table.get(region_id) {
            Some(label) => Ok(ResolvedPlace::from_area(label.clone())),
            None => Err(ResolveError::unresolved(
                point.longitude,
                point.latitude,
                format!("region id {region_id} is not in the reference table"),
            )),
        }
    }
}
