use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

use crate::error::ConfigError;
use crate::route::CoordinateSystem;

/* Everything the pipeline needs is passed in through these structs. A config
file looks like:

{
  "transform": { "from": "wgs84", "to": "gcj02" },
  "resolve": { "fail_fast": false, "workers": 4 },
  "area_info": {
    "use": "polygon",
    "polygon": { "boundary_dir": "data/boundaries", "reference_db": "data/area.db" },
    "amap": { "key": "...", "requests_per_second": 3 }
  }
}

Only the section named by `use` has to be present.
*/

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub resolve: ResolveConfig,
    #[serde(default)]
    pub area_info: Option<AreaInfoConfig>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<PipelineConfig, ConfigError> {
        debug!("loading config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<PipelineConfig, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.resolve.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub enabled: bool,
    pub from: CoordinateSystem,
    pub to: CoordinateSystem,
    // leave points outside mainland China untouched
    pub skip_outside_china: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        TransformConfig {
            enabled: true,
            from: CoordinateSystem::Wgs84,
            to: CoordinateSystem::Gcj02,
            skip_outside_china: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub enabled: bool,
    // stop at the first point that fails to resolve
    pub fail_fast: bool,
    // number of threads resolving ahead of the main loop, 1 disables prefetch
    pub workers: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        ResolveConfig {
            enabled: true,
            fail_fast: false,
            workers: 1,
        }
    }
}

impl ResolveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolve.workers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AreaSource {
    Polygon,
    Nominatim,
    Amap,
    Baidu,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaInfoConfig {
    #[serde(rename = "use")]
    pub source: String,
    #[serde(default)]
    pub polygon: Option<PolygonConfig>,
    #[serde(default)]
    pub nominatim: Option<NominatimConfig>,
    #[serde(default)]
    pub amap: Option<AmapConfig>,
    #[serde(default)]
    pub baidu: Option<BaiduConfig>,
}

impl AreaInfoConfig {
    pub fn area_source(&self) -> Result<AreaSource, ConfigError> {
        AreaSource::from_str(self.source.trim())
            .map_err(|_| ConfigError::InvalidStrategy(self.source.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolygonConfig {
    pub boundary_dir: PathBuf,
    pub reference_db: PathBuf,
    // feature property holding the region identifier
    #[serde(default = "default_region_id_property")]
    pub region_id_property: String,
    // datum the boundary files are drawn in
    #[serde(default = "default_boundary_system")]
    pub boundary_system: CoordinateSystem,
}

fn default_region_id_property() -> String {
    "code".to_string()
}

fn default_boundary_system() -> CoordinateSystem {
    CoordinateSystem::Gcj02
}

#[derive(Debug, Clone, Deserialize)]
pub struct NominatimConfig {
    pub url: String,
    #[serde(default = "default_nominatim_rate")]
    pub requests_per_second: f64,
    #[serde(default = "default_true")]
    pub bilingual: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmapConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_commercial_rate")]
    pub requests_per_second: f64,
    #[serde(default = "default_amap_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaiduConfig {
    #[serde(default)]
    pub ak: String,
    #[serde(default = "default_commercial_rate")]
    pub requests_per_second: f64,
    #[serde(default)]
    pub bilingual: bool,
    #[serde(default = "default_baidu_url")]
    pub url: String,
}

// the public nominatim instance allows one request per second
fn default_nominatim_rate() -> f64 {
    1.0
}

fn default_commercial_rate() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "zh-CN".to_string()
}

fn default_secondary_language() -> String {
    "en".to_string()
}

fn default_amap_url() -> String {
    "https://restapi.amap.com/v3/geocode/regeo".to_string()
}

fn default_baidu_url() -> String {
    "https://api.map.baidu.com/reverse_geocoding/v3/".to_string()
}

pub fn validate_rate(field: &'static str, requests_per_second: f64) -> Result<(), ConfigError> {
    if requests_per_second.is_finite() && requests_per_second > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected a positive number, got {requests_per_second}"),
        })
    }
}
