//! Station record normalization

use serde_json::{Map, Value};

/// Reduce one `getstationsdata` device record to `{indoor, outdoor}`.
///
/// `indoor` is the device's own dashboard block when the device is the
/// indoor module; `outdoor` is the dashboard block of an `Outdoor` module
/// (the last one wins if several are attached). Returns `None` when the
/// device's dashboard data has no `time_utc`, i.e. the station is offline.
pub fn parse_station_data(device: &Value) -> Option<Value> {
    let dashboard = device.get("dashboard_data")?;
    dashboard.get("time_utc")?;

    let mut result = Map::new();
    if device.get("module_name").and_then(Value::as_str) == Some("Indoor") {
        result.insert("indoor".to_string(), dashboard.clone());
    }

    let outdoor = device
        .get("modules")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|module| module.get("module_name").and_then(Value::as_str) == Some("Outdoor"))
        .filter_map(|module| module.get("dashboard_data"))
        .last();
    if let Some(outdoor) = outdoor {
        result.insert("outdoor".to_string(), outdoor.clone());
    }

    Some(Value::Object(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn station() -> Value {
        json!({
            "_id": "70:ee:50:00:00:01",
            "module_name": "Indoor",
            "dashboard_data": { "time_utc": 1704448800, "Temperature": 21.4, "CO2": 612 },
            "modules": [
                { "module_name": "Rain", "dashboard_data": { "Rain": 0.2 } },
                { "module_name": "Outdoor", "dashboard_data": { "time_utc": 1704448790, "Temperature": -3.1 } }
            ]
        })
    }

    #[test]
    fn test_indoor_and_outdoor() {
        let parsed = parse_station_data(&station()).unwrap();
        assert_eq!(parsed["indoor"]["Temperature"], 21.4);
        assert_eq!(parsed["outdoor"]["Temperature"], -3.1);
        assert!(parsed.get("Rain").is_none());
    }

    #[test]
    fn test_last_outdoor_module_wins() {
        let mut device = station();
        device["modules"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "module_name": "Outdoor", "dashboard_data": { "Temperature": 4.0 } }));
        assert_eq!(parse_station_data(&device).unwrap()["outdoor"]["Temperature"], 4.0);
    }

    #[test]
    fn test_non_indoor_device_has_no_indoor_block() {
        let mut device = station();
        device["module_name"] = json!("Cabin");
        let parsed = parse_station_data(&device).unwrap();
        assert!(parsed.get("indoor").is_none());
        assert!(parsed.get("outdoor").is_some());
    }

    #[test]
    fn test_offline_station_is_invalid() {
        let mut device = station();
        device["dashboard_data"].as_object_mut().unwrap().remove("time_utc");
        assert_eq!(parse_station_data(&device), None);

        assert_eq!(parse_station_data(&json!({ "module_name": "Indoor" })), None);
    }

    #[test]
    fn test_outdoor_without_dashboard_is_skipped() {
        let device = json!({
            "module_name": "Indoor",
            "dashboard_data": { "time_utc": 1 },
            "modules": [{ "module_name": "Outdoor", "reachable": false }]
        });
        assert!(parse_station_data(&device).unwrap().get("outdoor").is_none());
    }
}
