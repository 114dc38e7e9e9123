//! Canned forecast payloads.

use serde_json::{json, Value};

/// A forecast document for one city with two three-hourly entries.
#[must_use]
pub fn forecast_payload(sid: i64, name: &str) -> Value {
    json!({
        "cod": "200",
        "city": {
            "id": sid,
            "name": name,
            "country": "NO",
            "coord": {"lat": 59.9127, "lon": 10.7461}
        },
        "list": [
            {
                "dt": 1_700_000_000,
                "main": {"temp": 4.5, "pressure": 1012},
                "wind": {"speed": 3.1, "deg": 240},
                "weather": [
                    {"id": 803, "icon": "04d"},
                    {"id": 500, "icon": "10d"}
                ]
            },
            {
                "dt": 1_700_010_800,
                "main": {"temp": 3.9},
                "wind": {"speed": 2.4, "deg": 225},
                "weather": [{"id": 800, "icon": "01n"}]
            }
        ]
    })
}

/// [`forecast_payload`] serialized to bytes.
#[must_use]
pub fn forecast_body(sid: i64, name: &str) -> Vec<u8> {
    forecast_payload(sid, name).to_string().into_bytes()
}
