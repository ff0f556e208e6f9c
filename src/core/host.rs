//! Capabilities the panel needs from whatever application embeds it.

use std::future::Future;

use crate::core::error::NinaError;
use crate::core::types::{Bounds, GeoPoint, Viewport};
use crate::pipeline::renderer::PanelView;

/// Callback fired whenever the host's visible map region changes.
pub type ViewportListener = Box<dyn Fn(Viewport) + Send + Sync>;

/// A registered panel: a label and a content area.
pub trait Panel: Send + Sync {
    fn set_label(&self, text: &str, title: &str);
    fn show(&self, view: &PanelView);
}

pub trait Host: Send + Sync + 'static {
    type Panel: Panel + 'static;

    /// Registers a named panel and hands back its handle.
    fn register_panel(&self, name: &str) -> Result<Self::Panel, NinaError>;

    /// Resolves once the panel is visible to the user.
    fn wait_attached(
        &self,
        panel: &Self::Panel,
    ) -> impl Future<Output = Result<(), NinaError>> + Send;

    fn viewport_center(&self) -> Option<GeoPoint>;

    fn viewport_bounds(&self) -> Option<Bounds>;

    fn on_viewport_change(&self, listener: ViewportListener);
}
