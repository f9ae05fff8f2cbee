#![allow(dead_code)]

use route_atlas::area_resolver::http::HttpClient;
use route_atlas::area_resolver::AreaResolver;
use route_atlas::error::ResolveError;
use route_atlas::route::{
    AreaLabel, CoordinateSystem, GeoPoint, RawPoint, ResolvedPlace, RoadLabel, TrackPoint,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const BOUNDARY_DIR: &str = "tests/data/boundaries";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn boundary_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(BOUNDARY_DIR)
}

/// Writes a reference db with the districts used by the boundary fixtures.
/// `999999` is deliberately missing.
pub fn create_reference_db(dir: &Path) -> PathBuf {
    let path = dir.join("area_code.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE `area_code` (
            `code` TEXT PRIMARY KEY NOT NULL,
            `province` TEXT,
            `city` TEXT,
            `area` TEXT
        );
        INSERT INTO area_code VALUES ('420106', '湖北省', '武汉市', '武昌区');
        INSERT INTO area_code VALUES ('420111', '湖北省', '武汉市', '洪山区');
        INSERT INTO area_code VALUES ('420115', '湖北省', '武汉市', '江夏区');
        INSERT INTO area_code VALUES ('429004', '湖北省', NULL, '仙桃市');",
    )
    .unwrap();
    path
}

pub fn area(province: &str, city: &str, district: &str) -> AreaLabel {
    AreaLabel::new(province, city, district)
}

pub fn road(codes: &str, name: &str) -> Option<RoadLabel> {
    RoadLabel::from_parts(codes, name)
}

/// `n` points heading east along 30.5N, one every 10 seconds.
pub fn raw_points(n: usize) -> Vec<RawPoint> {
    (0..n)
        .map(|i| RawPoint {
            index: i,
            time: None,
            elapsed_sec: i as f64 * 10.,
            longitude: 114.3 + i as f64 * 0.001,
            latitude: 30.5,
            elevation: None,
            course: None,
        })
        .collect()
}

pub fn track_point(
    index: usize,
    area: AreaLabel,
    road: Option<RoadLabel>,
) -> TrackPoint {
    let raw = RawPoint {
        index,
        time: None,
        elapsed_sec: index as f64,
        longitude: 114.3,
        latitude: 30.5,
        elevation: None,
        course: None,
    };
    let mut point = TrackPoint::from_raw(&raw, CoordinateSystem::Wgs84);
    point.area = area;
    point.road = road;
    point
}

type Handler = Box<dyn Fn(&str, &[(&str, String)]) -> anyhow::Result<String> + Send + Sync>;

/// Answers requests with whatever `handler` returns and remembers what was
/// asked.
pub struct FakeHttpClient {
    handler: Handler,
    pub calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeHttpClient {
    pub fn new(
        handler: impl Fn(&str, &[(&str, String)]) -> anyhow::Result<String> + Send + Sync + 'static,
    ) -> Self {
        FakeHttpClient {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_, _| Ok(body.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn query_value(&self, call: usize, key: &str) -> Option<String> {
        self.calls.lock().unwrap()[call]
            .1
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

impl HttpClient for FakeHttpClient {
    fn get(&self, url: &str, query: &[(&str, String)]) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push((
            url.to_string(),
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        (self.handler)(url, query)
    }
}

pub fn query_param<'a>(query: &'a [(&str, String)], key: &str) -> &'a str {
    query
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

type Script = Box<dyn Fn(GeoPoint) -> Result<ResolvedPlace, ResolveError> + Send + Sync>;

/// Resolver driven by a closure, for pipeline tests.
pub struct ScriptedResolver {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new(
        script: impl Fn(GeoPoint) -> Result<ResolvedPlace, ResolveError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedResolver {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AreaResolver for ScriptedResolver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn resolve(
        &self,
        point: GeoPoint,
        _system: CoordinateSystem,
    ) -> Result<ResolvedPlace, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(point)
    }
}

/// Index of a point produced by `raw_points`, recovered from its longitude.
pub fn index_of(point: GeoPoint) -> usize {
    ((point.longitude - 114.3) / 0.001).round() as usize
}
