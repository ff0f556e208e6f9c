use chrono::Local;

use crate::core::types::{Bounds, GeoPoint, Viewport};
use crate::pipeline::renderer::PanelView;

/// Degrees the map moves per arrow key.
pub const PAN_STEP_DEG: f64 = 0.05;
const HALF_SPAN_LAT: f64 = 0.25;
const HALF_SPAN_LON: f64 = 0.4;

pub enum Pan {
    North,
    South,
    East,
    West,
}

/// Terminal-side state of the panel: what is shown and where the "map" is.
pub struct App {
    pub label: String,
    pub title: String,
    pub view: PanelView,
    pub center: GeoPoint,
    pub selected: usize,
    pub logs: Vec<String>,
}

impl App {
    pub fn new(center: GeoPoint) -> Self {
        Self {
            label: String::new(),
            title: String::new(),
            view: PanelView::Loading,
            center,
            selected: 0,
            logs: vec!["[SYSTEM] NINA panel starting".to_string()],
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            center: self.center,
            bounds: Some(Bounds {
                south_west: GeoPoint::new(
                    self.center.lat - HALF_SPAN_LAT,
                    self.center.lon - HALF_SPAN_LON,
                ),
                north_east: GeoPoint::new(
                    self.center.lat + HALF_SPAN_LAT,
                    self.center.lon + HALF_SPAN_LON,
                ),
            }),
        }
    }

    pub fn pan(&mut self, dir: Pan) -> Viewport {
        let (d_lat, d_lon) = match dir {
            Pan::North => (PAN_STEP_DEG, 0.0),
            Pan::South => (-PAN_STEP_DEG, 0.0),
            Pan::East => (0.0, PAN_STEP_DEG),
            Pan::West => (0.0, -PAN_STEP_DEG),
        };
        self.center = GeoPoint::new(
            (self.center.lat + d_lat).clamp(-90.0, 90.0),
            (self.center.lon + d_lon).clamp(-180.0, 180.0),
        );
        self.viewport()
    }

    pub fn show(&mut self, view: PanelView) {
        let msg = match &view {
            PanelView::Loading => "🔄 loading warnings...".to_string(),
            PanelView::Populated { alerts, .. } => format!("✅ {} warnings", alerts.len()),
            PanelView::Empty => "❌ no current warnings".to_string(),
            PanelView::Errored { message } => format!("⚠️ {}", message),
        };
        let settled = !matches!(view, PanelView::Loading);
        self.view = view;
        if settled {
            self.selected = self.selected.min(self.alert_count().saturating_sub(1));
        }
        self.log(msg);
    }

    pub fn alert_count(&self) -> usize {
        match &self.view {
            PanelView::Populated { alerts, .. } => alerts.len(),
            _ => 0,
        }
    }

    pub fn next(&mut self) {
        let count = self.alert_count();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn prev(&mut self) {
        let count = self.alert_count();
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    pub fn log(&mut self, msg: impl Into<String>) {
        self.logs
            .push(format!("[{}] {}", Local::now().format("%H:%M:%S"), msg.into()));
        if self.logs.len() > 10 {
            self.logs.remove(0);
        }
    }
}
