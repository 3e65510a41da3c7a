// Extension window/tab API seen by the broker
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// OS-level window identifier assigned by the browser
pub type WindowId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowType {
    Normal,
    Popup,
    Panel,
    App,
    Devtools,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: Option<WindowId>,
    #[serde(rename = "type")]
    pub window_type: WindowType,
    pub top: Option<i32>,
    pub left: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: Option<i64>,
    pub url: Option<String>,
    pub fav_icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenWindowOptions {
    pub url: String,
    #[serde(rename = "type")]
    pub window_type: WindowType,
    pub width: i32,
    pub height: i32,
    pub left: i32,
    pub top: i32,
}

/// Browser extension platform calls used by the popup manager
#[async_trait]
pub trait ExtensionPlatform: Send + Sync {
    async fn all_windows(&self) -> Result<Vec<WindowInfo>>;

    async fn focus_window(&self, id: WindowId) -> Result<()>;

    async fn last_focused_window(&self) -> Result<WindowInfo>;

    async fn open_window(&self, options: OpenWindowOptions) -> Result<WindowInfo>;

    async fn close_window(&self, id: WindowId) -> Result<()>;

    /// Tabs active in the last focused window
    async fn active_tabs(&self) -> Result<Vec<TabInfo>>;

    /// Stream of ids of windows the browser reports as removed.
    ///
    /// Called once by the popup manager when it attaches its close listener.
    fn window_removed_events(&self) -> mpsc::UnboundedReceiver<WindowId>;
}
