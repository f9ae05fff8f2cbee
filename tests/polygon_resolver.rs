pub mod test_utils;

use route_atlas::area_resolver::area_code_db::AreaCodeTable;
use route_atlas::area_resolver::polygon::{BoundaryCollection, PolygonAreaResolver};
use route_atlas::area_resolver::AreaResolver;
use route_atlas::coord_transform;
use route_atlas::error::{ConfigError, ResolveError};
use route_atlas::route::{CoordinateSystem, GeoPoint};
use tempdir::TempDir;
use test_utils::area;

fn build_resolver(temp_dir: &TempDir) -> PolygonAreaResolver {
    let collections = BoundaryCollection::load_dir(&test_utils::boundary_dir(), "code").unwrap();
    let db = test_utils::create_reference_db(temp_dir.path());
    let table = AreaCodeTable::open(&db).unwrap();
    PolygonAreaResolver::new(collections, table, CoordinateSystem::Gcj02)
}

fn resolve_gcj(resolver: &PolygonAreaResolver, lng: f64, lat: f64) -> Result<String, ResolveError> {
    resolver
        .resolve(GeoPoint::new(lng, lat), CoordinateSystem::Gcj02)
        .map(|place| place.area.district)
}

#[test]
fn load_order() {
    let collections = BoundaryCollection::load_dir(&test_utils::boundary_dir(), "code").unwrap();
    let sources: Vec<&str> = collections.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, vec!["01_districts.geojson", "02_overlay.geojson"]);
    assert_eq!(collections[0].polygons.len(), 3);
    // numeric ids are read as text
    assert_eq!(collections[0].polygons[1].region_id, "420111");
}

#[test]
fn basic() {
    test_utils::init_logger();
    let temp_dir = TempDir::new("polygon_resolver-basic").unwrap();
    let resolver = build_resolver(&temp_dir);
    assert_eq!(resolver.polygon_count(), 4);

    let place = resolver
        .resolve(GeoPoint::new(114.25, 30.50), CoordinateSystem::Gcj02)
        .unwrap();
    assert_eq!(place.area, area("湖北省", "武汉市", "武昌区"));
    assert_eq!(place.road, None);

    // second part of a multipolygon
    assert_eq!(resolve_gcj(&resolver, 114.61, 30.61).unwrap(), "洪山区");
    // only in the overlay file
    assert_eq!(resolve_gcj(&resolver, 114.42, 30.58).unwrap(), "江夏区");
}

#[test]
fn first_loaded_polygon_wins() {
    let temp_dir = TempDir::new("polygon_resolver-overlap").unwrap();
    let resolver = build_resolver(&temp_dir);
    // inside both 洪山区 (first file) and 江夏区 (second file)
    for _ in 0..10 {
        assert_eq!(resolve_gcj(&resolver, 114.37, 30.52).unwrap(), "洪山区");
    }

    // reversing the load order flips the answer
    let mut collections =
        BoundaryCollection::load_dir(&test_utils::boundary_dir(), "code").unwrap();
    collections.reverse();
    // build_resolver already wrote the db
    let table = AreaCodeTable::open(&temp_dir.path().join("area_code.db")).unwrap();
    let reversed = PolygonAreaResolver::new(collections, table, CoordinateSystem::Gcj02);
    assert_eq!(resolve_gcj(&reversed, 114.37, 30.52).unwrap(), "江夏区");
}

#[test]
fn unresolved() {
    let temp_dir = TempDir::new("polygon_resolver-unresolved").unwrap();
    let resolver = build_resolver(&temp_dir);

    match resolve_gcj(&resolver, 116.40, 39.90) {
        Err(ResolveError::Unresolved { .. }) => (),
        other => panic!("unexpected: {:?}", other),
    }

    // polygon found, but its id is not in the reference table
    match resolve_gcj(&resolver, 114.48, 30.47) {
        Err(ResolveError::Unresolved { reason, .. }) => assert!(reason.contains("999999")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn converts_into_boundary_system() {
    let temp_dir = TempDir::new("polygon_resolver-convert").unwrap();
    let resolver = build_resolver(&temp_dir);
    // a WGS84 point whose GCJ02 position is well inside 武昌区
    let gcj = GeoPoint::new(114.25, 30.50);
    let wgs = coord_transform::transform(gcj, CoordinateSystem::Gcj02, CoordinateSystem::Wgs84);
    let place = resolver.resolve(wgs, CoordinateSystem::Wgs84).unwrap();
    assert_eq!(place.area.district, "武昌区");
}

#[test]
fn reference_table() {
    let temp_dir = TempDir::new("polygon_resolver-table").unwrap();
    let db = test_utils::create_reference_db(temp_dir.path());
    let table = AreaCodeTable::open(&db).unwrap();
    assert_eq!(table.len(), 4);
    // NULL columns come back empty
    assert_eq!(table.get("429004").unwrap(), &area("湖北省", "", "仙桃市"));
    assert!(table.get("000000").is_none());

    assert!(matches!(
        AreaCodeTable::open(&temp_dir.path().join("missing.db")),
        Err(ConfigError::MissingReferenceDb(_))
    ));
}

#[test]
fn missing_boundary_dir() {
    let temp_dir = TempDir::new("polygon_resolver-missing").unwrap();
    assert!(matches!(
        BoundaryCollection::load_dir(&temp_dir.path().join("nope"), "code"),
        Err(ConfigError::MissingBoundaryDir(_))
    ));
}
