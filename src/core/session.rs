use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, Weak,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{
    config::AppConfig,
    core::{
        error::NinaError,
        host::{Host, Panel},
        types::{GeoPoint, NormalizedAlert, Viewport},
    },
    pipeline::{
        processor::{process_alerts, ProcessOptions},
        renderer::{PanelView, Renderer},
    },
    sources::fetcher::Fetcher,
};

pub const PANEL_NAME: &str = "nina-warnings";
pub const PANEL_LABEL: &str = "NINA";
pub const PANEL_TITLE: &str = "NINA Warnmeldungen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PanelState {
    Idle,
    Loading,
    Populated,
    Empty,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(PanelState),
    /// Another cycle was already running; this trigger was dropped.
    Coalesced,
}

/// One mounted warnings panel and everything its refresh cycles share.
pub struct Session<H: Host> {
    host: Arc<H>,
    panel: H::Panel,
    fetcher: Fetcher,
    renderer: Renderer,
    options: ProcessOptions,
    refresh_interval: Duration,
    refresh_on_viewport_change: bool,
    viewport: Mutex<Option<Viewport>>,
    alerts: Mutex<Vec<NormalizedAlert>>,
    state: Mutex<PanelState>,
    in_flight: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<H: Host> Session<H> {
    /// Registers the panel, waits until it is attached, runs the first cycle
    /// (which shows the loading view) and starts the periodic refresh. Pair
    /// with [`Session::teardown`].
    pub async fn mount(host: Arc<H>, config: &AppConfig) -> Result<Arc<Self>, NinaError> {
        config.validate()?;
        let fetcher = Fetcher::new(config)?;

        let panel = host.register_panel(PANEL_NAME)?;
        panel.set_label(PANEL_LABEL, PANEL_TITLE);
        host.wait_attached(&panel).await?;

        let initial = host.viewport_center().map(|center| Viewport {
            center,
            bounds: host.viewport_bounds(),
        });

        let session = Arc::new(Self {
            host: host.clone(),
            panel,
            fetcher,
            renderer: Renderer::new(config.web_base.clone()),
            options: ProcessOptions {
                radius_km: config.radius_km,
                max_alerts: config.max_alerts,
            },
            refresh_interval: config.refresh_interval(),
            refresh_on_viewport_change: config.refresh_on_viewport_change,
            viewport: Mutex::new(initial),
            alerts: Mutex::new(Vec::new()),
            state: Mutex::new(PanelState::Idle),
            in_flight: AtomicBool::new(false),
            timer: Mutex::new(None),
        });
        tracing::info!(
            "panel mounted with {} endpoints ({:?})",
            session.fetcher.endpoints().len(),
            session.fetcher.mode()
        );

        host.on_viewport_change(viewport_listener(Arc::downgrade(&session)));

        session.refresh().await;
        session.start_timer();
        Ok(session)
    }

    /// Runs one fetch-process-render cycle unless one is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = CycleGuard::try_acquire(&self.in_flight) else {
            tracing::debug!("refresh already in flight, trigger coalesced");
            return RefreshOutcome::Coalesced;
        };

        self.set_state(PanelState::Loading);
        self.panel.show(&PanelView::Loading);

        let now = Utc::now();
        let center = self.capture_viewport();
        let (view, state) = match self.run_cycle(center.as_ref(), now).await {
            Ok((alerts, view)) => {
                let state = if alerts.is_empty() {
                    PanelState::Empty
                } else {
                    PanelState::Populated
                };
                tracing::info!("refresh done: {} warnings shown", alerts.len());
                *lock(&self.alerts) = alerts;
                (view, state)
            }
            Err(err) => {
                tracing::error!("refresh failed: {}", err);
                lock(&self.alerts).clear();
                (
                    PanelView::Errored {
                        message: err.to_string(),
                    },
                    PanelState::Errored,
                )
            }
        };

        self.panel.show(&view);
        self.set_state(state);
        RefreshOutcome::Completed(state)
    }

    async fn run_cycle(
        &self,
        center: Option<&GeoPoint>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<NormalizedAlert>, PanelView), NinaError> {
        let raw = self.fetcher.fetch(now).await;
        let alerts = process_alerts(&raw, center, &self.options);
        let view = self.renderer.render(&alerts, now)?;
        Ok((alerts, view))
    }

    fn capture_viewport(&self) -> Option<GeoPoint> {
        let mut snapshot = lock(&self.viewport);
        if let Some(center) = self.host.viewport_center() {
            *snapshot = Some(Viewport {
                center,
                bounds: self.host.viewport_bounds(),
            });
        }
        snapshot.map(|v| v.center)
    }

    fn start_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let period = self.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                tracing::debug!("timer refresh");
                session.refresh().await;
            }
        });
        if let Some(old) = lock(&self.timer).replace(handle) {
            old.abort();
        }
    }

    /// Cancels the periodic refresh. In-flight requests run to completion.
    pub fn teardown(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
            tracing::info!("panel torn down, refresh timer cancelled");
        }
    }

    pub fn timer_active(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn state(&self) -> PanelState {
        *lock(&self.state)
    }

    pub fn alerts(&self) -> Vec<NormalizedAlert> {
        lock(&self.alerts).clone()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        *lock(&self.viewport)
    }

    fn set_state(&self, state: PanelState) {
        *lock(&self.state) = state;
    }

    fn viewport_changed(&self, viewport: Viewport) {
        *lock(&self.viewport) = Some(viewport);
    }
}

impl<H: Host> Drop for Session<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn viewport_listener<H: Host>(weak: Weak<Session<H>>) -> crate::core::host::ViewportListener {
    Box::new(move |viewport: Viewport| {
        let Some(session) = weak.upgrade() else {
            return;
        };
        session.viewport_changed(viewport);
        if !session.refresh_on_viewport_change {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    session.refresh().await;
                });
            }
            Err(_) => tracing::warn!("viewport changed outside the runtime, refresh skipped"),
        }
    })
}

/// Holds the single in-flight slot until dropped.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
