//! Region and forecast mapping from forecast API records.

use super::{EntityMapper, Mapper};
use crate::errors::{Result, WeatherflowError};
use crate::store::{EntityRef, Forecast, Region, Session};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// How a record finds the region it updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLookup {
    /// Match on `city.id`, which must be present.
    ById,
    /// Match on `city.id`, defaulting to 0.
    ByLocation,
    /// Update the singleton region flagged as current.
    Current,
}

/// Upserts a region from one forecast API record.
#[derive(Debug, Clone, Copy)]
pub struct RegionMapper {
    lookup: RegionLookup,
}

impl RegionMapper {
    /// Creates a mapper with the given lookup strategy.
    #[must_use]
    pub fn new(lookup: RegionLookup) -> Self {
        Self { lookup }
    }

    /// Mapper for region-by-id requests.
    #[must_use]
    pub fn by_id() -> Self {
        Self::new(RegionLookup::ById)
    }

    /// Mapper for region-by-coordinate requests.
    #[must_use]
    pub fn by_location() -> Self {
        Self::new(RegionLookup::ByLocation)
    }

    /// Mapper for the device's current region.
    #[must_use]
    pub fn current() -> Self {
        Self::new(RegionLookup::Current)
    }

    /// The lookup strategy.
    #[must_use]
    pub fn lookup(&self) -> RegionLookup {
        self.lookup
    }
}

impl EntityMapper for RegionMapper {
    fn map(&self, record: &Value, session: &Session) -> Result<EntityRef> {
        let existing = match self.lookup {
            RegionLookup::ById => {
                let sid = city_id(record).ok_or_else(|| WeatherflowError::missing("city.id"))?;
                session.fetch_first(|region| region.sid == sid)?
            }
            RegionLookup::ByLocation => {
                let sid = city_id(record).unwrap_or(0);
                session.fetch_first(|region| region.sid == sid)?
            }
            RegionLookup::Current => session.fetch_first(|region| region.is_current)?,
        };

        let (id, mut region) = match existing {
            Some((id, region)) => (Some(id), region),
            None => (None, Region::default()),
        };
        apply_region_record(&mut region, record)?;
        if self.lookup == RegionLookup::Current {
            region.is_current = true;
        }

        Ok(match id {
            Some(id) => {
                session.update(id, region);
                id
            }
            None => session.insert(region),
        })
    }
}

/// Builds an unpersisted [`Region`] from a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionSnapshotMapper;

impl Mapper for RegionSnapshotMapper {
    type Output = Region;

    fn map(&self, record: &Value) -> Result<Region> {
        let mut region = Region::default();
        apply_region_record(&mut region, record)?;
        Ok(region)
    }
}

fn city_id(record: &Value) -> Option<i64> {
    record.get("city")?.get("id")?.as_i64()
}

/// Overwrites `region` with the city and forecast data in `record`.
///
/// `city.coord.lat` and `city.coord.lon` are required. The forecast series is
/// replaced wholesale by `list`; a missing or non-object `list` clears it.
///
/// # Errors
///
/// Returns `WeatherflowError::MissingData` for an absent required field or a
/// malformed forecast entry. `region` is left untouched on error.
pub fn apply_region_record(region: &mut Region, record: &Value) -> Result<()> {
    let city = record
        .get("city")
        .and_then(Value::as_object)
        .ok_or_else(|| WeatherflowError::missing("city"))?;
    let coord = city
        .get("coord")
        .and_then(Value::as_object)
        .ok_or_else(|| WeatherflowError::missing("city.coord"))?;
    let longitude =
        number(coord, "lon").ok_or_else(|| WeatherflowError::missing("city.coord.lon"))?;
    let latitude =
        number(coord, "lat").ok_or_else(|| WeatherflowError::missing("city.coord.lat"))?;

    let entries: Vec<&Map<String, Value>> = record
        .get("list")
        .and_then(Value::as_array)
        .and_then(|list| list.iter().map(Value::as_object).collect())
        .unwrap_or_default();
    let forecasts = entries
        .into_iter()
        .map(forecast_from)
        .collect::<Result<Vec<_>>>()?;

    region.name = city.get("name").and_then(Value::as_str).map(str::to_string);
    region.country = city.get("country").and_then(Value::as_str).map(str::to_string);
    region.sid = city.get("id").and_then(Value::as_i64).unwrap_or(0);
    region.longitude = longitude;
    region.latitude = latitude;
    region.forecasts = forecasts;
    Ok(())
}

fn forecast_from(entry: &Map<String, Value>) -> Result<Forecast> {
    let seconds = entry.get("dt").and_then(Value::as_f64).unwrap_or(0.0);
    let time = timestamp(seconds).ok_or_else(|| WeatherflowError::missing("list[].dt"))?;
    let day = time
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .ok_or_else(|| WeatherflowError::missing("list[].dt"))?;

    let temp = match entry.get("main").and_then(Value::as_object) {
        Some(main) => number(main, "temp")
            .ok_or_else(|| WeatherflowError::missing("list[].main.temp"))?,
        None => 0.0,
    };
    let (wind_speed, wind_deg) = match entry.get("wind").and_then(Value::as_object) {
        Some(wind) => (
            number(wind, "speed").ok_or_else(|| WeatherflowError::missing("list[].wind.speed"))?,
            number(wind, "deg").ok_or_else(|| WeatherflowError::missing("list[].wind.deg"))?,
        ),
        None => (0.0, 0.0),
    };
    let icon = entry
        .get("weather")
        .and_then(Value::as_array)
        .and_then(|weather| weather.last())
        .and_then(|last| last.get("icon"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Forecast {
        day,
        time,
        temp,
        wind_speed,
        wind_deg,
        icon,
    })
}

fn number(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(Value::as_f64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn timestamp(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectStore;
    use crate::testing::fixtures::forecast_payload;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_apply_region_record() {
        let mut region = Region::default();
        apply_region_record(&mut region, &forecast_payload(3_143_244, "Oslo")).unwrap();

        assert_eq!(region.sid, 3_143_244);
        assert_eq!(region.name.as_deref(), Some("Oslo"));
        assert_eq!(region.country.as_deref(), Some("NO"));
        assert_eq!(region.forecasts.len(), 2);

        let first = &region.forecasts[0];
        assert_eq!(first.time.timestamp(), 1_700_000_000);
        assert_eq!(first.day.timestamp(), 1_699_920_000);
        assert_eq!(first.temp, 4.5);
        assert_eq!(first.wind_speed, 3.1);
        assert_eq!(first.wind_deg, 240.0);
        assert_eq!(first.icon.as_deref(), Some("10d"));
    }

    #[test]
    fn test_missing_coordinate_is_missing_data() {
        let mut region = Region::default();
        let record = json!({"city": {"id": 1, "coord": {"lat": 1.0}}});
        let err = apply_region_record(&mut region, &record).unwrap_err();
        assert_eq!(err, WeatherflowError::missing("city.coord.lon"));
        assert_eq!(region, Region::default());
    }

    #[test]
    fn test_present_main_without_temp_is_missing_data() {
        let record = json!({
            "city": {"coord": {"lat": 1.0, "lon": 2.0}},
            "list": [{"dt": 0, "main": {"pressure": 1000}}]
        });
        let err = apply_region_record(&mut Region::default(), &record).unwrap_err();
        assert_eq!(err, WeatherflowError::missing("list[].main.temp"));
    }

    #[test]
    fn test_optional_fields_default() {
        let record = json!({"city": {"coord": {"lat": 1.5, "lon": 2.5}}, "list": [{}]});
        let mut region = Region::default();
        apply_region_record(&mut region, &record).unwrap();

        assert_eq!(region.sid, 0);
        assert_eq!(region.name, None);
        assert_eq!(region.coordinate().latitude, 1.5);
        assert_eq!(region.forecasts[0].time.timestamp(), 0);
        assert_eq!(region.forecasts[0].icon, None);
    }

    #[test]
    fn test_by_id_requires_city_id() {
        let store = ObjectStore::in_memory();
        let session = store.background_session();
        let record = json!({"city": {"coord": {"lat": 1.0, "lon": 2.0}}});

        let err = RegionMapper::by_id().map(&record, &session).unwrap_err();
        assert_eq!(err, WeatherflowError::missing("city.id"));
        assert!(!session.has_changes());

        assert!(RegionMapper::by_location().map(&record, &session).is_ok());
    }

    #[test]
    fn test_by_id_upserts_same_entity() {
        let store = ObjectStore::in_memory();
        let session = store.background_session();

        let first = RegionMapper::by_id().map(&forecast_payload(7, "Bergen"), &session).unwrap();
        let second = RegionMapper::by_id().map(&forecast_payload(7, "Bergen"), &session).unwrap();

        assert_eq!(first, second);
        assert_eq!(session.fetch(|r| r.sid == 7).unwrap().len(), 1);
    }

    #[test]
    fn test_current_region_is_singleton() {
        let store = ObjectStore::in_memory();
        let session = store.background_session();

        let first = RegionMapper::current().map(&forecast_payload(1, "Oslo"), &session).unwrap();
        let second = RegionMapper::current().map(&forecast_payload(2, "Bergen"), &session).unwrap();

        assert_eq!(first, second);
        let current = session.resolve(second).unwrap().unwrap();
        assert!(current.is_current);
        assert_eq!(current.sid, 2);
        assert_eq!(session.fetch(|r| r.is_current).unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_mapper() {
        let region = RegionSnapshotMapper.map(&forecast_payload(5, "Tromsø")).unwrap();
        assert_eq!(region.sid, 5);
        assert!(!region.is_current);
    }
}
