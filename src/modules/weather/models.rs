use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A forecast location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub id: &'static str,
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// Configured cities. The upstream answers in this order and responses are
/// matched back to cities by position.
pub const CITIES: [City; 8] = [
    City { id: "seoul", name: "서울", latitude: 37.5665, longitude: 126.978 },
    City { id: "busan", name: "부산", latitude: 35.1796, longitude: 129.0756 },
    City { id: "incheon", name: "인천", latitude: 37.4563, longitude: 126.7052 },
    City { id: "daegu", name: "대구", latitude: 35.8714, longitude: 128.6014 },
    City { id: "daejeon", name: "대전", latitude: 36.3504, longitude: 127.3845 },
    City { id: "gwangju", name: "광주", latitude: 35.1595, longitude: 126.8526 },
    City { id: "gangneung", name: "강릉", latitude: 37.7519, longitude: 128.8761 },
    City { id: "jeju", name: "제주", latitude: 33.4996, longitude: 126.5312 },
];

/// Hourly series; every array has the same length and index `i` is the same
/// hour in all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub weather_code: Vec<Option<i64>>,
}

impl HourlySeries {
    /// Truncate all arrays to `min(limit, shortest array)`.
    pub fn aligned(mut self, limit: usize) -> Self {
        let len = limit
            .min(self.time.len())
            .min(self.temperature_2m.len())
            .min(self.precipitation_probability.len())
            .min(self.weather_code.len());

        self.time.truncate(len);
        self.temperature_2m.truncate(len);
        self.precipitation_probability.truncate(len);
        self.weather_code.truncate(len);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityForecast {
    pub id: String,
    pub name: String,
    pub current: Value,
    pub hourly: HourlySeries,
    pub daily: Value,
}

/// The cached payload and the `GET /api/weather/forecast` body. Always
/// written whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub cities: BTreeMap<String, CityForecast>,
    pub timestamp: String,
}

/// One location in the upstream response.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationForecast {
    #[serde(default)]
    pub current: Value,
    #[serde(default)]
    pub hourly: HourlySeries,
    #[serde(default)]
    pub daily: Value,
}

/// Multi-location requests answer with an array, single-location ones with a
/// bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ForecastBody {
    Many(Vec<LocationForecast>),
    One(Box<LocationForecast>),
}

impl ForecastBody {
    pub fn into_locations(self) -> Vec<LocationForecast> {
        match self {
            ForecastBody::Many(locations) => locations,
            ForecastBody::One(location) => vec![*location],
        }
    }
}

/// Pair `locations[i]` with `cities[i]`. Extra entries on either side are
/// dropped.
pub fn zip_cities(
    cities: &[City],
    locations: Vec<LocationForecast>,
    hourly_limit: usize,
) -> Vec<CityForecast> {
    if locations.len() != cities.len() {
        tracing::warn!(
            expected = cities.len(),
            received = locations.len(),
            "forecast location count does not match configured cities"
        );
    }

    cities
        .iter()
        .zip(locations)
        .map(|(city, location)| CityForecast {
            id: city.id.to_string(),
            name: city.name.to_string(),
            current: location.current,
            hourly: location.hourly.aligned(hourly_limit),
            daily: location.daily,
        })
        .collect()
}
