pub mod test_utils;

use route_atlas::area_resolver::http::HttpClient;
use route_atlas::area_resolver::{build_resolver, build_resolver_with_client};
use route_atlas::config::{AreaInfoConfig, AreaSource, PipelineConfig};
use route_atlas::error::{ConfigError, Provider};
use route_atlas::route::{CoordinateSystem, GeoPoint};
use route_atlas::route_processor::{CancelFlag, RoutePipeline};
use std::fs;
use std::sync::Arc;
use tempdir::TempDir;
use test_utils::FakeHttpClient;

fn area_info(json: &str) -> AreaInfoConfig {
    serde_json::from_str(json).unwrap()
}

fn fake_client() -> Option<Arc<dyn HttpClient>> {
    Some(Arc::new(FakeHttpClient::always("{}")))
}

#[test]
fn load_from_file() {
    let temp_dir = TempDir::new("config-load").unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
          "transform": {"from": "wgs84", "to": "bd09", "skip_outside_china": true},
          "resolve": {"fail_fast": true, "workers": 4},
          "area_info": {
            "use": "Baidu",
            "baidu": {"ak": "abc", "bilingual": true}
          }
        }"#,
    )
    .unwrap();
    let config = PipelineConfig::load(&path).unwrap();
    assert_eq!(config.transform.to, CoordinateSystem::Bd09);
    assert!(config.transform.skip_outside_china);
    assert!(config.resolve.fail_fast);
    assert_eq!(config.resolve.workers, 4);

    let area_info = config.area_info.unwrap();
    assert_eq!(area_info.area_source().unwrap(), AreaSource::Baidu);
    let baidu = area_info.baidu.unwrap();
    assert_eq!(baidu.requests_per_second, 3.0);
    assert!(baidu.url.starts_with("https://api.map.baidu.com/"));
}

#[test]
fn unreadable_config() {
    let temp_dir = TempDir::new("config-unreadable").unwrap();
    assert!(matches!(
        PipelineConfig::load(&temp_dir.path().join("missing.json")),
        Err(ConfigError::Io(_))
    ));
    assert!(matches!(
        PipelineConfig::from_json(r#"{"transform": {"from": "mercator"}}"#),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn invalid_strategy() {
    let config = area_info(r#"{"use": "google"}"#);
    match build_resolver(&config) {
        Err(ConfigError::InvalidStrategy(name)) => assert_eq!(name, "google"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("resolver built for an unknown strategy"),
    }
}

#[test]
fn missing_section() {
    let config = area_info(r#"{"use": "amap", "baidu": {"ak": "abc"}}"#);
    assert!(matches!(
        build_resolver_with_client(&config, fake_client()),
        Err(ConfigError::MissingSection("amap"))
    ));
}

#[test]
fn missing_credentials() {
    let config = area_info(r#"{"use": "amap", "amap": {"key": " "}}"#);
    assert!(matches!(
        build_resolver_with_client(&config, fake_client()),
        Err(ConfigError::MissingCredential(Provider::Amap))
    ));
    let config = area_info(r#"{"use": "baidu", "baidu": {}}"#);
    assert!(matches!(
        build_resolver_with_client(&config, fake_client()),
        Err(ConfigError::MissingCredential(Provider::Baidu))
    ));
}

#[test]
fn invalid_rate() {
    let config = area_info(
        r#"{"use": "nominatim", "nominatim": {"url": "http://localhost:8080", "requests_per_second": 0}}"#,
    );
    assert!(matches!(
        build_resolver_with_client(&config, fake_client()),
        Err(ConfigError::InvalidValue {
            field: "nominatim.requests_per_second",
            ..
        })
    ));
}

#[test]
fn remote_resolvers() {
    for (json, name) in [
        (r#"{"use": "nominatim", "nominatim": {"url": "http://localhost:8080"}}"#, "nominatim"),
        (r#"{"use": "amap", "amap": {"key": "k"}}"#, "amap"),
        (r#"{"use": "baidu", "baidu": {"ak": "k"}}"#, "baidu"),
    ] {
        let resolver = build_resolver_with_client(&area_info(json), fake_client()).unwrap();
        assert_eq!(resolver.name(), name);
    }
}

#[test]
fn polygon_paths() {
    let temp_dir = TempDir::new("config-polygon").unwrap();
    let db = test_utils::create_reference_db(temp_dir.path());

    let config = area_info(&format!(
        r#"{{"use": "polygon", "polygon": {{"boundary_dir": {:?}, "reference_db": {:?}}}}}"#,
        temp_dir.path().join("nope"),
        db
    ));
    assert!(matches!(
        build_resolver(&config),
        Err(ConfigError::MissingBoundaryDir(_))
    ));

    let config = area_info(&format!(
        r#"{{"use": "polygon", "polygon": {{"boundary_dir": {:?}, "reference_db": {:?}}}}}"#,
        test_utils::boundary_dir(),
        temp_dir.path().join("missing.db")
    ));
    assert!(matches!(
        build_resolver(&config),
        Err(ConfigError::MissingReferenceDb(_))
    ));

    let broken_dir = temp_dir.path().join("broken");
    fs::create_dir(&broken_dir).unwrap();
    fs::write(broken_dir.join("a.geojson"), r#"{"type": "Point", "coordinates": [1, 2]}"#)
        .unwrap();
    let config = area_info(&format!(
        r#"{{"use": "polygon", "polygon": {{"boundary_dir": {:?}, "reference_db": {:?}}}}}"#,
        broken_dir, db
    ));
    assert!(matches!(
        build_resolver(&config),
        Err(ConfigError::InvalidBoundary { .. })
    ));
}

#[test]
fn polygon_pipeline_end_to_end() {
    test_utils::init_logger();
    let temp_dir = TempDir::new("config-end_to_end").unwrap();
    let db = test_utils::create_reference_db(temp_dir.path());
    let config = PipelineConfig::from_json(&format!(
        r#"{{
          "transform": {{"from": "gcj02", "to": "gcj02"}},
          "area_info": {{
            "use": "polygon",
            "polygon": {{"boundary_dir": {:?}, "reference_db": {:?}}}
          }}
        }}"#,
        test_utils::boundary_dir(),
        db
    ))
    .unwrap();
    let pipeline = RoutePipeline::from_config(&config).unwrap();

    let mut points = test_utils::raw_points(3);
    // the last one is far outside every boundary
    points[2].longitude = 100.0;
    let run = pipeline.process(points, &CancelFlag::new());
    assert_eq!(run.summary.resolved, 2);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(run.points[0].area.district, "武昌区");
    assert_eq!(
        run.points[0].transformed,
        Some((GeoPoint::new(114.3, 30.5), CoordinateSystem::Gcj02))
    );
}
