//! Request handling with fake adapters

mod common;

use rstest::rstest;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use common::{
    bare_sources, drain, household_relay, relay, tags, FakeEnergy, FakeLights, FakeNews, FakePage,
    FakeRunner, FakeStation,
};
use homeboard_relay::{Broadcaster, ClientRequest, Config, ConnectionRegistry, EventTag, RelayError};
use homeboard_sources::lights::Scene;
use homeboard_sources::SourceError;

const WAIT: Duration = Duration::from_millis(100);

#[rstest]
#[case("news", Value::Null)]
#[case("weather", Value::Null)]
#[case("calendar", Value::Null)]
#[case("tibber", Value::Null)]
#[case("tibber2", Value::Null)]
#[case("tibber3", Value::Null)]
#[case("setthermo", json!(21))]
#[case("setLights", json!("tv"))]
#[case("playpause", Value::Null)]
#[case("playnext", Value::Null)]
#[case("playshuffle", Value::Null)]
#[case("volumeup", Value::Null)]
#[case("volumedown", Value::Null)]
#[case("gettrack", Value::Null)]
#[case("playURI", json!("spotify:track:4uLU6hMCjMI75M1A2tKUQC"))]
#[case("playRadio", json!(["24861", "NRK P3"]))]
#[tokio::test]
async fn test_unconfigured_integrations_are_silent(#[case] name: &str, #[case] data: Value) {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let relay = relay(Config::default(), bare_sources(), &broadcaster, None);

    let request = ClientRequest::parse(name, data).unwrap();
    relay.handle(request).await.unwrap();

    assert!(drain(&mut rx, WAIT).await.is_empty());
}

#[tokio::test]
async fn test_enabled_reflects_configured_sources() {
    let broadcaster = Broadcaster::new(16);
    let relay = relay(Config::default(), bare_sources(), &broadcaster, None);
    let enabled: Vec<&str> = relay.enabled().iter().map(|id| id.name()).collect();
    assert_eq!(enabled, vec!["quotes", "system"]);
}

#[rstest]
#[case(json!("AAPL,EQNR.OL"))]
#[case(json!(["AAPL", "EQNR.OL"]))]
#[tokio::test]
async fn test_quotes_broadcast_once_per_request(#[case] symbols: Value) {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let relay = relay(Config::default(), bare_sources(), &broadcaster, None);

    relay
        .handle(ClientRequest::parse("quotes", symbols).unwrap())
        .await
        .unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Quotes]);
    assert!(events[0].payload.get("AAPL").is_some());
    assert!(events[0].payload.get("EQNR.OL").is_some());
}

#[tokio::test]
async fn test_news_drops_excluded_titles() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let config = Config::from_json(r#"{"newsapi":{"key":"k","exclude":["sport"]}}"#).unwrap();
    let mut sources = bare_sources();
    sources.news = Some(Arc::new(FakeNews(vec![
        json!({ "title": "SPORT: Norway wins" }),
        json!({ "title": "Storm warning for the west coast" }),
        json!({ "title": null }),
    ])));
    let relay = relay(config, sources, &broadcaster, None);

    relay.handle(ClientRequest::News).await.unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::News]);
    assert_eq!(events[0].payload.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_weather_skips_offline_stations() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let mut sources = bare_sources();
    sources.weather = Some(Arc::new(FakeStation(vec![
        json!({
            "_id": "70:ee:50:00:00:01",
            "module_name": "Indoor",
            "dashboard_data": { "time_utc": 1704448800, "Temperature": 21.4 },
            "modules": [{ "module_name": "Outdoor", "dashboard_data": { "Temperature": -3.1 } }]
        }),
        json!({ "_id": "70:ee:50:00:00:02", "module_name": "Indoor", "dashboard_data": {} }),
    ])));
    let relay = relay(Config::default(), sources, &broadcaster, None);

    relay.handle(ClientRequest::Weather).await.unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Weather]);
    assert_eq!(events[0].payload["outdoor"]["Temperature"], -3.1);
}

#[tokio::test]
async fn test_tibber_publishes_first_home() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let mut sources = bare_sources();
    sources.tibber = Some(Arc::new(FakeEnergy::new(json!({
        "viewer": { "homes": [{ "currentSubscription": { "id": "sub-1" } }, { "currentSubscription": null }] }
    }))));
    let relay = relay(Config::default(), sources, &broadcaster, None);

    relay.handle(ClientRequest::Tibber).await.unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Tibber]);
    assert_eq!(events[0].payload["currentSubscription"]["id"], "sub-1");
}

fn tibber2_config() -> Config {
    Config::from_json(
        r#"{"tibber2":{"token":"t","homeId":"home-1","inverter":"inv-1","production":"prod-1","thermostat":"th-1"}}"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_tibber_home_and_vehicles_use_variables() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let energy = Arc::new(FakeEnergy::new(json!({ "me": { "home": { "thermostats": [] } } })));
    let mut sources = bare_sources();
    sources.tibber2 = Some(energy.clone());
    let relay = relay(tibber2_config(), sources, &broadcaster, None);

    relay.handle(ClientRequest::Tibber2).await.unwrap();
    relay.handle(ClientRequest::Tibber3).await.unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Tibber2, EventTag::Tibber3]);
    assert_eq!(events[0].payload, json!({ "thermostats": [] }));

    let queries = energy.queries.lock();
    assert_eq!(
        queries[0].1,
        json!({ "homeId": "home-1", "inverterId": "inv-1", "productionId": "prod-1" })
    );
    assert_eq!(queries[1].1, json!({ "homeId": "home-1" }));
    assert!(!queries[0].0.contains("home-1"));
}

#[tokio::test]
async fn test_setthermo_sends_validated_temperature_without_broadcast() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let energy = Arc::new(FakeEnergy::new(json!({ "me": null })));
    let mut sources = bare_sources();
    sources.tibber2 = Some(energy.clone());
    let relay = relay(tibber2_config(), sources, &broadcaster, None);

    relay
        .handle(ClientRequest::SetThermo(json!("21.5")))
        .await
        .unwrap();

    {
        let queries = energy.queries.lock();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].0.starts_with("mutation"));
        assert_eq!(
            queries[0].1,
            json!({ "homeId": "home-1", "thermostatId": "th-1", "temperature": 21.5 })
        );
    }
    assert!(drain(&mut rx, WAIT).await.is_empty());
}

#[rstest]
#[case(json!("21) } } mutation { x"))]
#[case(json!(4.9))]
#[case(json!(true))]
#[tokio::test]
async fn test_setthermo_rejects_invalid_temperature(#[case] temperature: Value) {
    let broadcaster = Broadcaster::new(16);
    let energy = Arc::new(FakeEnergy::new(json!({})));
    let mut sources = bare_sources();
    sources.tibber2 = Some(energy.clone());
    let relay = relay(tibber2_config(), sources, &broadcaster, None);

    let result = relay.handle(ClientRequest::SetThermo(temperature)).await;
    assert!(matches!(
        result,
        Err(RelayError::Source(SourceError::InvalidInput(_)))
    ));
    assert!(energy.queries.lock().is_empty());
}

#[tokio::test]
async fn test_set_lights_applies_scene() {
    let broadcaster = Broadcaster::new(16);
    let lights = Arc::new(FakeLights::default());
    let mut sources = bare_sources();
    sources.lights = Some(lights.clone());
    let relay = relay(Config::default(), sources, &broadcaster, None);

    relay
        .handle(ClientRequest::SetLights("Dinner".to_string()))
        .await
        .unwrap();
    assert!(relay
        .handle(ClientRequest::SetLights("disco".to_string()))
        .await
        .is_err());
    assert_eq!(*lights.0.lock(), vec![Scene::Dinner]);
}

#[tokio::test]
async fn test_host_commands_use_configured_lines() {
    let broadcaster = Broadcaster::new(16);
    let runner = Arc::new(FakeRunner::default());
    let mut sources = bare_sources();
    sources.commands = runner.clone();
    let config = Config::from_json(r#"{"system":{"restart":"systemctl restart homeboard"}}"#).unwrap();
    let relay = relay(config, sources, &broadcaster, None);

    relay.handle(ClientRequest::Restart).await.unwrap();
    relay.handle(ClientRequest::Reboot).await.unwrap();
    assert_eq!(
        *runner.0.lock(),
        vec!["systemctl restart homeboard".to_string(), "sudo reboot".to_string()]
    );
}

#[rstest]
#[case(Some(r#"<script>window.config = {"accessToken":"XYZ123","locale":"en"}</script>"#), Some("XYZ123"))]
#[case(Some("<html>maintenance</html>"), None)]
#[case(None, None)]
#[tokio::test]
async fn test_config_carries_scraped_bearer(#[case] page: Option<&str>, #[case] bearer: Option<&str>) {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let config = Config::from_json(
        r#"{"netatmo":{"client_id":"cid","client_secret":"secret","forecast":{"device_id":"70:ee:50:00:00:01"}}}"#,
    )
    .unwrap();
    let mut sources = bare_sources();
    sources.weather_map = Arc::new(FakePage(page.map(str::to_string)));
    let relay = relay(config, sources, &broadcaster, None);

    relay.handle(ClientRequest::Config).await.unwrap();

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Config]);
    let forecast = &events[0].payload["netatmo"]["forecast"];
    assert_eq!(forecast.get("bearer").and_then(Value::as_str), bearer);
    assert!(!events[0].payload.to_string().contains("secret"));
    assert_eq!(relay.weather_token().unwrap().current().as_deref(), bearer);
}

#[tokio::test]
async fn test_dispatch_by_name_runs_in_background() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let relay = relay(Config::default(), bare_sources(), &broadcaster, None);

    relay.dispatch("bogus", Value::Null);
    relay.dispatch("playURI", json!(42));
    relay.dispatch("quotes", json!(["NOK=X"]));

    let events = drain(&mut rx, WAIT).await;
    assert_eq!(tags(&events), vec![EventTag::Quotes]);
}

#[tokio::test]
async fn test_new_connection_replays_speaker_state() {
    let broadcaster = Broadcaster::new(16);
    let (relay, _network) = household_relay(&broadcaster).await;
    let registry = ConnectionRegistry::new(relay);
    let mut rx = broadcaster.subscribe();

    let client = registry.connect(Some("http://homeboard.local:8080".to_string()));
    assert_eq!(registry.count(), 1);

    let mut seen = tags(&drain(&mut rx, WAIT).await);
    seen.sort_by_key(|tag| tag.as_str());
    assert_eq!(
        seen,
        vec![EventTag::SonosState, EventTag::SonosTrack, EventTag::SonosVolume]
    );

    registry.disconnect(&client);
    assert_eq!(registry.count(), 0);
}

#[tokio::test]
async fn test_connection_without_speaker_replays_nothing() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let registry = ConnectionRegistry::new(relay(Config::default(), bare_sources(), &broadcaster, None));

    let client = registry.connect(None);
    assert!(registry.get(&client).is_some());
    assert!(drain(&mut rx, WAIT).await.is_empty());
}

#[tokio::test]
async fn test_speaker_requests_reach_bound_group() {
    let broadcaster = Broadcaster::new(16);
    let mut rx = broadcaster.subscribe();
    let (relay, network) = household_relay(&broadcaster).await;

    relay.handle(ClientRequest::VolumeUp).await.unwrap();
    relay.handle(ClientRequest::PlayShuffle).await.unwrap();
    relay.handle(ClientRequest::GetTrack).await.unwrap();

    let speaker = network.speaker("10.0.0.11:1400").unwrap();
    assert_eq!(
        speaker.calls(),
        vec!["adjust_volume 1", "set_play_mode SHUFFLE", "current_track"]
    );
    assert_eq!(tags(&drain(&mut rx, WAIT).await), vec![EventTag::SonosTrack]);
}
