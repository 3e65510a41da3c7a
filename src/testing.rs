// Test doubles for the injected collaborators
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::bus::EventBus;
use crate::error::{BrokerError, Result};
use crate::platform::{ExtensionPlatform, OpenWindowOptions, TabInfo, WindowId, WindowInfo, WindowType};
use crate::popup::PopupManager;
use crate::wallet::address::StateInit;
use crate::wallet::StateInitEncoder;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Platform call log entry
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Open(OpenWindowOptions),
    Focus(WindowId),
    Close(WindowId),
}

#[derive(Default)]
struct FakeState {
    windows: Vec<WindowInfo>,
    next_id: WindowId,
    calls: Vec<PlatformCall>,
    fav_icon: Option<String>,
    fail_close: bool,
    removed_tx: Option<mpsc::UnboundedSender<WindowId>>,
}

/// In-memory browser with one focused normal window
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        let focused = WindowInfo {
            id: Some(1),
            window_type: WindowType::Normal,
            top: Some(40),
            left: Some(100),
            width: Some(1280),
            height: Some(800),
        };
        Arc::new(Self {
            state: Mutex::new(FakeState {
                windows: vec![focused],
                next_id: 100,
                fav_icon: Some("https://example.com/favicon.ico".to_string()),
                ..Default::default()
            }),
        })
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().calls.clone()
    }

    pub fn opened(&self) -> Vec<OpenWindowOptions> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Open(options) => Some(options),
                _ => None,
            })
            .collect()
    }

    pub fn focus_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, PlatformCall::Focus(_))).count()
    }

    pub fn popup_count(&self) -> usize {
        self.state
            .lock()
            .windows
            .iter()
            .filter(|w| w.window_type == WindowType::Popup)
            .count()
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    pub fn set_fav_icon(&self, icon: Option<&str>) {
        self.state.lock().fav_icon = icon.map(str::to_string);
    }

    /// Simulate the user closing a window with the title-bar button
    pub fn user_closes(&self, id: WindowId) {
        let mut state = self.state.lock();
        state.windows.retain(|w| w.id != Some(id));
        if let Some(tx) = &state.removed_tx {
            let _ = tx.send(id);
        }
    }

    /// Drop a window without emitting a removal event
    pub fn forget_window(&self, id: WindowId) {
        self.state.lock().windows.retain(|w| w.id != Some(id));
    }
}

#[async_trait]
impl ExtensionPlatform for FakePlatform {
    async fn all_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(self.state.lock().windows.clone())
    }

    async fn focus_window(&self, id: WindowId) -> Result<()> {
        self.state.lock().calls.push(PlatformCall::Focus(id));
        Ok(())
    }

    async fn last_focused_window(&self) -> Result<WindowInfo> {
        let state = self.state.lock();
        state
            .windows
            .iter()
            .find(|w| w.window_type == WindowType::Normal)
            .cloned()
            .ok_or_else(|| BrokerError::Platform("No focused window".to_string()))
    }

    async fn open_window(&self, options: OpenWindowOptions) -> Result<WindowInfo> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.next_id += 1;
        let window = WindowInfo {
            id: Some(state.next_id),
            window_type: options.window_type,
            top: Some(options.top),
            left: Some(options.left),
            width: Some(options.width),
            height: Some(options.height),
        };
        state.windows.push(window.clone());
        state.calls.push(PlatformCall::Open(options));
        Ok(window)
    }

    async fn close_window(&self, id: WindowId) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(PlatformCall::Close(id));
        if state.fail_close {
            return Err(BrokerError::Platform(format!("No window with id: {}", id)));
        }
        state.windows.retain(|w| w.id != Some(id));
        if let Some(tx) = &state.removed_tx {
            let _ = tx.send(id);
        }
        Ok(())
    }

    async fn active_tabs(&self) -> Result<Vec<TabInfo>> {
        let state = self.state.lock();
        Ok(vec![TabInfo {
            id: Some(1),
            url: Some("https://example.com".to_string()),
            fav_icon_url: state.fav_icon.clone(),
        }])
    }

    fn window_removed_events(&self) -> mpsc::UnboundedReceiver<WindowId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().removed_tx = Some(tx);
        rx
    }
}

/// Encodes a state init as base64 of its cell hash, standing in for a BOC library
pub struct HashEncoder;

impl StateInitEncoder for HashEncoder {
    fn encode_state_init(&self, init: &StateInit) -> Result<String> {
        use base64::Engine;
        Ok(base64::engine::general_purpose::STANDARD.encode(init.hash()?))
    }
}

/// Yield until the bus holds at least `count` listeners
pub async fn wait_for_listeners(bus: &EventBus, count: usize) {
    for _ in 0..1000 {
        if bus.listener_count() >= count {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("bus never reached {} listeners (has {})", count, bus.listener_count());
}

/// Yield until the manager tracks a popup window
pub async fn wait_for_popup(popups: &PopupManager) -> WindowId {
    for _ in 0..1000 {
        if let Some(id) = popups.current().await {
            return id;
        }
        tokio::task::yield_now().await;
    }
    panic!("popup was never opened");
}
