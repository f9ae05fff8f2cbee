use itertools::Itertools;

use crate::road_sign::{merge_empty_bridges, merge_interchange_and_toll, render_road_label};
use crate::route::{RoadLabel, TrackPoint};

const ELLIPSIS: char = '…';
const ROAD_SEPARATOR: &str = " → ";
// filled in by hand with the video time the segment starts at
const TIMESTAMP_PLACEHOLDER: &str = "（视频 XX:XX）";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistrictSegment {
    pub district: String,
    pub roads: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitySegment {
    pub province: String,
    pub city: String,
    pub districts: Vec<DistrictSegment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvinceSegment {
    pub province: String,
    pub cities: Vec<CitySegment>,
}

/// What makes two points part of the same city segment. A city name alone is
/// not enough, different provinces have cities with the same name.
pub fn city_key(point: &TrackPoint) -> (&str, &str) {
    (&point.area.province, &point.area.city)
}

pub fn district_key(point: &TrackPoint) -> (&str, &str, &str) {
    (
        &point.area.province,
        &point.area.city,
        &point.area.district,
    )
}

fn strip_ellipsis(item: &str) -> &str {
    item.trim_matches(ELLIPSIS)
}

struct SegmentBuilder {
    provinces: Vec<ProvinceSegment>,
}

impl SegmentBuilder {
    // The district emitted most recently, wherever it sits in the tree.
    fn last_leaf_mut(&mut self) -> Option<&mut DistrictSegment> {
        self.provinces
            .last_mut()?
            .cities
            .last_mut()?
            .districts
            .last_mut()
    }

    fn start_city(&mut self, province: &str, city: &str) {
        let same_province = self
            .provinces
            .last()
            .map(|p| p.province == province)
            .unwrap_or(false);
        if !same_province {
            self.provinces.push(ProvinceSegment {
                province: province.to_string(),
                cities: Vec::new(),
            });
        }
        if let Some(current) = self.provinces.last_mut() {
            current.cities.push(CitySegment {
                province: province.to_string(),
                city: city.to_string(),
                districts: Vec::new(),
            });
        }
    }

    fn push_district(&mut self, district: &str, roads: Vec<&Option<RoadLabel>>) {
        let mut roads: Vec<String> = roads
            .into_iter()
            .dedup()
            .map(|road| render_road_label(road.as_ref()))
            .collect();
        roads = merge_interchange_and_toll(roads);
        roads = merge_empty_bridges(roads);

        // A road running across the boundary shows up at the end of one
        // district and the start of the next; mark both sides.
        if let (Some(first), Some(previous)) = (
            roads.first_mut(),
            self.last_leaf_mut().and_then(|leaf| leaf.roads.last_mut()),
        ) {
            if strip_ellipsis(first) == strip_ellipsis(previous) {
                first.insert(0, ELLIPSIS);
                if !previous.ends_with(ELLIPSIS) {
                    previous.push(ELLIPSIS);
                }
            }
        }

        if let Some(city) = self
            .provinces
            .last_mut()
            .and_then(|province| province.cities.last_mut())
        {
            city.districts.push(DistrictSegment {
                district: district.to_string(),
                roads,
            });
        }
    }
}

/// Collapses a resolved track into Province → City → District runs, each
/// district holding the rendered roads travelled in it.
///
/// Points without an area (failed resolutions) are left out, so a single
/// failure does not split a district in two.
pub fn compress(points: &[TrackPoint]) -> Vec<ProvinceSegment> {
    let mut builder = SegmentBuilder {
        provinces: Vec::new(),
    };
    let cities = points
        .iter()
        .filter(|point| !point.area.is_empty())
        .chunk_by(|point| city_key(*point));
    for ((province, city), city_run) in &cities {
        builder.start_city(province, city);
        let districts = city_run.chunk_by(|point| district_key(*point));
        for ((_, _, district), district_run) in &districts {
            builder.push_district(district, district_run.map(|point| &point.road).collect());
        }
    }
    builder.provinces
}

/// Renders segments as nested timeline blocks for the travel blog.
pub fn render_markdown(provinces: &[ProvinceSegment]) -> String {
    let mut text = String::new();
    for city in provinces.iter().flat_map(|p| &p.cities) {
        let districts: String = city
            .districts
            .iter()
            .map(|district| {
                format!(
                    "\n<!-- timeline {}{} -->\n{}\n<!-- endtimeline -->",
                    district.district,
                    TIMESTAMP_PLACEHOLDER,
                    district.roads.join(ROAD_SEPARATOR)
                )
            })
            .collect();
        text.push_str(&format!(
            "\n{{% timeline {} {}{} %}}\n{}\n{{% endtimeline %}}",
            city.province, city.city, TIMESTAMP_PLACEHOLDER, districts
        ));
    }
    text
}
