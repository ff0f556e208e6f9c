use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpmock::prelude::*;
use nina_panel::config::{AppConfig, FeedConfig};
use nina_panel::core::error::NinaError;
use nina_panel::core::geo::offset_north;
use nina_panel::core::host::{Host, Panel, ViewportListener};
use nina_panel::core::session::{PanelState, RefreshOutcome, Session, PANEL_LABEL, PANEL_NAME};
use nina_panel::core::types::{Bounds, GeoPoint, Severity, Viewport};
use nina_panel::pipeline::renderer::PanelView;
use nina_panel::sources::fetcher::FetchMode;
use serde_json::{json, Value};

#[derive(Default)]
struct Recorded {
    panel_name: Option<String>,
    label: Option<String>,
    views: Vec<PanelView>,
}

struct RecordingHost {
    center: Mutex<Option<GeoPoint>>,
    recorded: Arc<Mutex<Recorded>>,
    listeners: Mutex<Vec<ViewportListener>>,
}

struct RecordingPanel {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingHost {
    fn new(center: Option<GeoPoint>) -> Arc<Self> {
        Arc::new(Self {
            center: Mutex::new(center),
            recorded: Arc::new(Mutex::new(Recorded::default())),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn move_to(&self, center: GeoPoint) {
        *self.center.lock().unwrap() = Some(center);
        let viewport = Viewport {
            center,
            bounds: None,
        };
        for listener in self.listeners.lock().unwrap().iter() {
            listener(viewport);
        }
    }

    fn views(&self) -> Vec<PanelView> {
        self.recorded.lock().unwrap().views.clone()
    }

    fn last_view(&self) -> PanelView {
        self.views().last().cloned().unwrap()
    }
}

impl Panel for RecordingPanel {
    fn set_label(&self, text: &str, _title: &str) {
        self.recorded.lock().unwrap().label = Some(text.to_string());
    }

    fn show(&self, view: &PanelView) {
        self.recorded.lock().unwrap().views.push(view.clone());
    }
}

impl Host for RecordingHost {
    type Panel = RecordingPanel;

    fn register_panel(&self, name: &str) -> Result<Self::Panel, NinaError> {
        self.recorded.lock().unwrap().panel_name = Some(name.to_string());
        Ok(RecordingPanel {
            recorded: self.recorded.clone(),
        })
    }

    fn wait_attached(
        &self,
        _panel: &Self::Panel,
    ) -> impl Future<Output = Result<(), NinaError>> + Send {
        async { Ok(()) }
    }

    fn viewport_center(&self) -> Option<GeoPoint> {
        *self.center.lock().unwrap()
    }

    fn viewport_bounds(&self) -> Option<Bounds> {
        None
    }

    fn on_viewport_change(&self, listener: ViewportListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}

fn config_for(server: &MockServer, paths: &[&str]) -> AppConfig {
    AppConfig {
        api_base: server.base_url(),
        timeout_ms: 2_000,
        feeds: paths
            .iter()
            .enumerate()
            .map(|(i, p)| FeedConfig {
                name: format!("feed{i}"),
                enabled: true,
                path: p.to_string(),
            })
            .collect(),
        ..AppConfig::default()
    }
}

fn located(id: &str, severity: &str, at: &GeoPoint) -> Value {
    json!({
        "id": id,
        "sent": "2024-05-01T10:00:00Z",
        "msgType": "Alert",
        "info": [{
            "headline": format!("Warnung {id}"),
            "severity": severity,
            "area": [{
                "areaDesc": "Rheinhessen",
                "geocode": [{ "valueName": "EMMA_COORD", "value": format!("{},{}", at.lat, at.lon) }]
            }]
        }]
    })
}

#[tokio::test]
async fn mount_runs_initial_cycle_and_filters_by_distance() {
    let center = GeoPoint::new(50.0, 8.0);
    let server = MockServer::start_async().await;
    let _feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/mowas/mapData.json");
            then.status(200).json_body(json!([
                located("A", "Severe", &offset_north(&center, 5.0)),
                located("B", "Extreme", &offset_north(&center, 150.0)),
            ]));
        })
        .await;

    let host = RecordingHost::new(Some(center));
    let cfg = config_for(&server, &["/mowas/mapData.json"]);
    let session = Session::mount(host.clone(), &cfg).await.unwrap();

    assert_eq!(session.state(), PanelState::Populated);
    let alerts = session.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, "A");
    assert_eq!(alerts[0].severity, Severity::Severe);

    {
        let recorded = host.recorded.lock().unwrap();
        assert_eq!(recorded.panel_name.as_deref(), Some(PANEL_NAME));
        assert_eq!(recorded.label.as_deref(), Some(PANEL_LABEL));
        assert_eq!(recorded.views.first(), Some(&PanelView::Loading));
        let loading = recorded
            .views
            .iter()
            .filter(|v| **v == PanelView::Loading)
            .count();
        assert_eq!(loading, 1, "one loading render per cycle");
        assert_eq!(recorded.views.len(), 2);
    }
    match host.last_view() {
        PanelView::Populated { alerts, summary } => {
            assert_eq!(alerts.len(), 1);
            assert_eq!(summary.severe, 1);
            assert_eq!(alerts[0].detail_link, "https://warnung.bund.de/meldung/A");
            assert!(alerts[0].distance.is_some());
        }
        other => panic!("unexpected view {:?}", other),
    }

    session.teardown();
}

#[tokio::test]
async fn failing_feeds_show_placeholder_not_error() {
    let server = MockServer::start_async().await;
    let _down = server
        .mock_async(|when, then| {
            when.method(GET).path("/dwd/mapData.json");
            then.status(503);
        })
        .await;

    let host = RecordingHost::new(None);
    let cfg = config_for(&server, &["/dwd/mapData.json"]);
    let session = Session::mount(host.clone(), &cfg).await.unwrap();

    assert_eq!(session.state(), PanelState::Populated);
    match host.last_view() {
        PanelView::Populated { alerts, .. } => {
            assert_eq!(alerts.len(), 1);
            assert_eq!(alerts[0].detail_link, "https://warnung.bund.de/meldungen");
        }
        other => panic!("unexpected view {:?}", other),
    }
    session.teardown();
}

#[tokio::test]
async fn empty_first_answer_shows_empty_view() {
    let server = MockServer::start_async().await;
    let _empty = server
        .mock_async(|when, then| {
            when.method(GET).path("/katwarn/mapData.json");
            then.status(200).json_body(json!([]));
        })
        .await;

    let host = RecordingHost::new(None);
    let mut cfg = config_for(&server, &["/katwarn/mapData.json"]);
    cfg.fetch_mode = FetchMode::FirstSuccess;
    let session = Session::mount(host.clone(), &cfg).await.unwrap();

    assert_eq!(session.state(), PanelState::Empty);
    assert_eq!(host.last_view(), PanelView::Empty);
    session.teardown();
}

#[tokio::test]
async fn pipeline_failure_surfaces_error_view() {
    let server = MockServer::start_async().await;
    let _feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/biwapp/mapData.json");
            then.status(200).json_body(json!([{ "id": "x", "headline": "Test" }]));
        })
        .await;

    let host = RecordingHost::new(None);
    let mut cfg = config_for(&server, &["/biwapp/mapData.json"]);
    cfg.web_base = "mailto:warnung@example.org".to_string();
    let session = Session::mount(host.clone(), &cfg).await.unwrap();

    assert_eq!(session.state(), PanelState::Errored);
    assert!(session.alerts().is_empty());
    match host.last_view() {
        PanelView::Errored { message } => assert!(message.contains("web_base")),
        other => panic!("unexpected view {:?}", other),
    }
    session.teardown();
}

#[tokio::test]
async fn overlapping_refresh_is_coalesced() {
    let server = MockServer::start_async().await;
    let _slow = server
        .mock_async(|when, then| {
            when.method(GET).path("/slow.json");
            then.status(200)
                .delay(Duration::from_millis(300))
                .json_body(json!([{ "id": "s", "headline": "Langsam" }]));
        })
        .await;

    let host = RecordingHost::new(None);
    let cfg = config_for(&server, &["/slow.json"]);
    let session = Session::mount(host.clone(), &cfg).await.unwrap();

    let (first, second) = tokio::join!(session.refresh(), session.refresh());
    assert_eq!(first, RefreshOutcome::Completed(PanelState::Populated));
    assert_eq!(second, RefreshOutcome::Coalesced);

    assert_eq!(
        session.refresh().await,
        RefreshOutcome::Completed(PanelState::Populated)
    );
    session.teardown();
}

#[tokio::test]
async fn viewport_changes_feed_the_next_cycle() {
    let start = GeoPoint::new(50.0, 8.0);
    let far_away = GeoPoint::new(53.55, 9.99);
    let server = MockServer::start_async().await;
    let _feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/mowas/mapData.json");
            then.status(200)
                .json_body(json!([located("near-start", "Moderate", &offset_north(&start, 2.0))]));
        })
        .await;

    let host = RecordingHost::new(Some(start));
    let cfg = config_for(&server, &["/mowas/mapData.json"]);
    let session = Session::mount(host.clone(), &cfg).await.unwrap();
    assert_eq!(session.alerts().len(), 1);

    host.move_to(far_away);
    assert_eq!(session.viewport().map(|v| v.center), Some(far_away));

    session.refresh().await;
    assert!(session.alerts().is_empty());
    assert_eq!(session.state(), PanelState::Empty);
    session.teardown();
}

#[tokio::test]
async fn teardown_cancels_timer() {
    let server = MockServer::start_async().await;
    let _feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/dwd/mapData.json");
            then.status(200).json_body(json!([]));
        })
        .await;

    let host = RecordingHost::new(None);
    let cfg = config_for(&server, &["/dwd/mapData.json"]);
    let session = Session::mount(host, &cfg).await.unwrap();

    assert!(session.timer_active());
    session.teardown();
    assert!(!session.timer_active());
}

#[tokio::test]
async fn timer_refreshes_until_teardown() {
    let server = MockServer::start_async().await;
    let feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/dwd/mapData.json");
            then.status(200).json_body(json!([{ "id": "t", "headline": "Frost" }]));
        })
        .await;

    let host = RecordingHost::new(None);
    let mut cfg = config_for(&server, &["/dwd/mapData.json"]);
    cfg.refresh_interval_secs = 1;
    let session = Session::mount(host.clone(), &cfg).await.unwrap();
    assert_eq!(feed.hits_async().await, 1);

    tokio::time::sleep(Duration::from_millis(2_300)).await;
    assert!(feed.hits_async().await >= 2, "timer never fired");

    session.teardown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = feed.hits_async().await;
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(feed.hits_async().await, settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn viewport_change_triggers_guarded_refresh() {
    let start = GeoPoint::new(50.0, 8.0);
    let far_away = GeoPoint::new(53.55, 9.99);
    let server = MockServer::start_async().await;
    let feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/mowas/mapData.json");
            then.status(200)
                .delay(Duration::from_millis(300))
                .json_body(json!([located("near-start", "Moderate", &offset_north(&start, 2.0))]));
        })
        .await;

    let host = RecordingHost::new(Some(start));
    let mut cfg = config_for(&server, &["/mowas/mapData.json"]);
    cfg.refresh_on_viewport_change = true;
    let session = Session::mount(host.clone(), &cfg).await.unwrap();
    assert_eq!(session.alerts().len(), 1);
    assert_eq!(feed.hits_async().await, 1);

    host.move_to(far_away);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), PanelState::Loading);
    assert_eq!(session.refresh().await, RefreshOutcome::Coalesced);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(feed.hits_async().await, 2);
    assert_eq!(session.state(), PanelState::Empty);
    assert!(session.alerts().is_empty());
    assert_eq!(host.last_view(), PanelView::Empty);
    session.teardown();
}

#[tokio::test]
async fn invalid_config_fails_mount() {
    let host = RecordingHost::new(None);
    let cfg = AppConfig {
        max_alerts: 0,
        ..AppConfig::default()
    };
    let err = Session::mount(host.clone(), &cfg).await.err().unwrap();
    assert!(matches!(err, NinaError::Config(_)));
    assert!(host.recorded.lock().unwrap().panel_name.is_none());
}
