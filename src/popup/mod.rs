//! Singleton approval popup.
//!
//! The manager owns the only popup window handle. Opening while a popup is
//! alive focuses it instead of creating a second window, and a browser
//! "window removed" event for the tracked id is re-published on the bus as
//! `closedPopUp`, which is how in-flight approvals learn the user closed it.

pub mod routes;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::bus::{BackgroundEvent, EventBus};
use crate::config::PopupConfig;
use crate::error::{BrokerError, Result};
use crate::platform::{ExtensionPlatform, OpenWindowOptions, WindowId, WindowType};

pub use routes::PopupRoute;

pub struct PopupManager {
    platform: Arc<dyn ExtensionPlatform>,
    bus: EventBus,
    config: PopupConfig,
    // Held across the platform round-trips of open_or_focus so two requests
    // racing to open cannot both create a window.
    popup_id: Mutex<Option<WindowId>>,
}

impl PopupManager {
    pub fn new(platform: Arc<dyn ExtensionPlatform>, bus: EventBus, config: PopupConfig) -> Self {
        Self {
            platform,
            bus,
            config,
            popup_id: Mutex::new(None),
        }
    }

    pub fn platform(&self) -> &Arc<dyn ExtensionPlatform> {
        &self.platform
    }

    /// Currently tracked popup window, if any
    pub async fn current(&self) -> Option<WindowId> {
        *self.popup_id.lock().await
    }

    /// Favicon of the active tab, URL-encoded; empty when unavailable
    pub async fn active_tab_logo(&self) -> String {
        match self.platform.active_tabs().await {
            Ok(tabs) => {
                let icon = tabs
                    .first()
                    .and_then(|tab| tab.fav_icon_url.clone())
                    .unwrap_or_default();
                urlencoding::encode(&icon).into_owned()
            }
            Err(e) => {
                log::warn!("Popup: could not read active tab: {}", e);
                String::new()
            }
        }
    }

    /// Focus the live popup, or open a new one at `route`.
    ///
    /// A popup that is already open is not re-navigated.
    pub async fn open_or_focus(&self, route: &str) -> Result<WindowId> {
        let mut popup_id = self.popup_id.lock().await;

        if let Some(id) = *popup_id {
            let windows = self.platform.all_windows().await?;
            let alive = windows
                .iter()
                .any(|win| win.window_type == WindowType::Popup && win.id == Some(id));
            if alive {
                log::info!("Popup: focusing existing window {}", id);
                self.platform.focus_window(id).await?;
                return Ok(id);
            }
            log::info!("Popup: window {} is gone, opening a new one", id);
        }

        let last_focused = self.platform.last_focused_window().await?;
        // Top-right corner of the last focused window
        let top = last_focused.top.unwrap_or(0);
        let left = last_focused.left.unwrap_or(0)
            + (last_focused.width.unwrap_or(self.config.width) - self.config.width);

        let window = self
            .platform
            .open_window(OpenWindowOptions {
                url: format!("{}#{}", self.config.index_page, route),
                window_type: WindowType::Popup,
                width: self.config.width,
                height: self.config.height,
                left,
                top,
            })
            .await?;

        let id = window
            .id
            .ok_or_else(|| BrokerError::Platform("Opened popup has no window id".to_string()))?;
        log::info!("Popup: opened window {} at {}", id, route);
        *popup_id = Some(id);
        Ok(id)
    }

    /// Open or focus the popup showing `route`
    pub async fn open(&self, route: &PopupRoute) -> Result<WindowId> {
        self.open_or_focus(&route.to_path()).await
    }

    /// Best-effort close; the window may already be gone
    pub async fn close(&self, id: Option<WindowId>) {
        let Some(id) = id else {
            return;
        };
        if let Err(e) = self.platform.close_window(id).await {
            log::error!("Popup: failed to close window {}: {}", id, e);
        }
    }

    /// React to the browser removing a window
    pub async fn handle_window_removed(&self, window_id: WindowId) -> bool {
        let mut popup_id = self.popup_id.lock().await;
        if *popup_id != Some(window_id) {
            return false;
        }
        *popup_id = None;
        drop(popup_id);

        let delivered = self.bus.publish(BackgroundEvent::ClosedPopUp { params: window_id });
        log::info!("Popup: window {} closed, {} waiter(s) notified", window_id, delivered);
        true
    }

    /// Spawn the task that forwards window removals for the lifetime of the platform stream
    pub fn attach_close_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut removed = self.platform.window_removed_events();
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(window_id) = removed.recv().await {
                manager.handle_window_removed(window_id).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use crate::testing::{init_logger, FakePlatform, PlatformCall};

    fn manager(platform: Arc<FakePlatform>, bus: EventBus) -> Arc<PopupManager> {
        Arc::new(PopupManager::new(platform, bus, PopupConfig::default()))
    }

    #[tokio::test]
    async fn test_open_positions_top_right() {
        init_logger();
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), EventBus::new());

        let id = popups.open_or_focus("/notifications").await.unwrap();

        let opened = platform.opened();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].url, "index.html#/notifications");
        assert_eq!(opened[0].width, 380);
        assert_eq!(opened[0].height, 620);
        assert_eq!(opened[0].top, 40);
        assert_eq!(opened[0].left, 100 + 1280 - 380);
        assert_eq!(popups.current().await, Some(id));
    }

    #[tokio::test]
    async fn test_second_open_focuses() {
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), EventBus::new());

        let first = popups.open_or_focus("/send?id=1").await.unwrap();
        let second = popups.open_or_focus("/send?id=2").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.opened().len(), 1);
        assert_eq!(platform.opened()[0].url, "index.html#/send?id=1");
        assert_eq!(platform.calls().last(), Some(&PlatformCall::Focus(first)));
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_one_window() {
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), EventBus::new());

        let (a, b, c) = tokio::join!(
            popups.open_or_focus("/a"),
            popups.open_or_focus("/b"),
            popups.open_or_focus("/c"),
        );

        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
        assert_eq!(platform.popup_count(), 1);
        assert_eq!(platform.opened().len(), 1);
        assert_eq!(platform.focus_count(), 2);
    }

    #[tokio::test]
    async fn test_reopens_after_window_vanished() {
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), EventBus::new());

        let first = popups.open_or_focus("/a").await.unwrap();
        platform.forget_window(first);
        let second = popups.open_or_focus("/b").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(platform.opened().len(), 2);
    }

    #[tokio::test]
    async fn test_close_failure_is_swallowed() {
        let platform = FakePlatform::new();
        platform.set_fail_close(true);
        let popups = manager(platform.clone(), EventBus::new());

        popups.close(Some(55)).await;
        popups.close(None).await;

        assert_eq!(platform.calls(), vec![PlatformCall::Close(55)]);
    }

    #[tokio::test]
    async fn test_removed_event_matches_identity() {
        let bus = EventBus::new();
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), bus.clone());
        let mut closed = bus.subscribe(Topic::ClosedPopUp);

        let id = popups.open_or_focus("/a").await.unwrap();

        assert!(!popups.handle_window_removed(1).await);
        assert_eq!(popups.current().await, Some(id));

        assert!(popups.handle_window_removed(id).await);
        assert_eq!(popups.current().await, None);
        assert_eq!(closed.recv().await, Some(BackgroundEvent::ClosedPopUp { params: id }));

        // Already cleared: a repeated event is not re-emitted
        assert!(!popups.handle_window_removed(id).await);
    }

    #[tokio::test]
    async fn test_listener_forwards_user_close() {
        let bus = EventBus::new();
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), bus.clone());
        let listener = popups.attach_close_listener();
        let mut closed = bus.subscribe(Topic::ClosedPopUp);

        let id = popups.open_or_focus("/a").await.unwrap();
        platform.user_closes(id);

        assert_eq!(closed.recv().await, Some(BackgroundEvent::ClosedPopUp { params: id }));
        listener.abort();
    }

    #[tokio::test]
    async fn test_active_tab_logo_encoded() {
        let platform = FakePlatform::new();
        let popups = manager(platform.clone(), EventBus::new());
        assert_eq!(
            popups.active_tab_logo().await,
            "https%3A%2F%2Fexample.com%2Ffavicon.ico"
        );

        platform.set_fav_icon(None);
        assert_eq!(popups.active_tab_logo().await, "");
    }
}
