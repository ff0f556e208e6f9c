use std::future::Future;
use std::io::Write;

use crate::core::{
    error::NinaError,
    host::{Host, Panel, ViewportListener},
    types::{Bounds, GeoPoint},
};
use crate::pipeline::renderer::{render_html, PanelView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFormat {
    Html,
    Json,
}

/// Host without a screen: settled views go to stdout, the viewport is fixed.
pub struct StdoutHost {
    format: ViewFormat,
    center: Option<GeoPoint>,
}

pub struct StdoutPanel {
    format: ViewFormat,
}

impl StdoutHost {
    pub fn new(format: ViewFormat, center: Option<GeoPoint>) -> Self {
        Self { format, center }
    }
}

impl Panel for StdoutPanel {
    fn set_label(&self, text: &str, title: &str) {
        tracing::debug!("panel label {} ({})", text, title);
    }

    fn show(&self, view: &PanelView) {
        if matches!(view, PanelView::Loading) {
            return;
        }
        let out = match self.format {
            ViewFormat::Html => render_html(view),
            ViewFormat::Json => match serde_json::to_string_pretty(view) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!("cannot serialize view: {}", err);
                    return;
                }
            },
        };
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{}", out) {
            tracing::warn!("stdout write failed: {}", err);
        }
    }
}

impl Host for StdoutHost {
    type Panel = StdoutPanel;

    fn register_panel(&self, name: &str) -> Result<Self::Panel, NinaError> {
        tracing::debug!("registering panel {}", name);
        Ok(StdoutPanel {
            format: self.format,
        })
    }

    fn wait_attached(
        &self,
        _panel: &Self::Panel,
    ) -> impl Future<Output = Result<(), NinaError>> + Send {
        async { Ok(()) }
    }

    fn viewport_center(&self) -> Option<GeoPoint> {
        self.center
    }

    fn viewport_bounds(&self) -> Option<Bounds> {
        None
    }

    fn on_viewport_change(&self, _listener: ViewportListener) {
        tracing::debug!("headless viewport is fixed, listener not kept");
    }
}
