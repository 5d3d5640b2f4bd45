//! Process-wide view of network reachability.
//!
//! [`ConnectivityMonitor`] owns the current [`ConnectivityState`] and is fed
//! by whatever platform signal the host has (an OS path monitor, or the
//! [`probe`] adapter). It never performs network I/O itself.
//!
//! Readers call [`ConnectivityMonitor::current_state()`] (never blocks) or
//! subscribe to transitions via [`ConnectivityMonitor::on_change()`] /
//! [`ConnectivityMonitor::subscribe()`]. Transitions are only published
//! when the externally visible classification changes: `is_connected` or
//! `interface_type`. Repeated identical OS events are swallowed.

pub mod probe;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

/// Network interface the current path runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    Wifi,
    Cellular,
    Ethernet,
    Other,
    Unknown,
}

/// Coarse connection quality derived from the path status and interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Raw path status as reported by the platform signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    /// A usable path exists.
    Satisfied,
    /// A path could exist but needs a connection to be established first
    /// (e.g. VPN on demand, captive cellular).
    RequiresConnection,
    /// No usable path.
    Unsatisfied,
}

/// One event from the platform connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathUpdate {
    pub status: PathStatus,
    pub interface: InterfaceType,
}

impl PathUpdate {
    pub fn new(status: PathStatus, interface: InterfaceType) -> Self {
        Self { status, interface }
    }
}

/// Snapshot of the current connectivity view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub interface_type: InterfaceType,
    pub quality: ConnectionQuality,
    /// Last disconnected → connected transition, if any.
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl ConnectivityState {
    /// State before any platform signal has arrived.
    pub fn offline() -> Self {
        Self {
            is_connected: false,
            interface_type: InterfaceType::Unknown,
            quality: ConnectionQuality::Poor,
            last_connected_at: None,
        }
    }

    /// A connected state over `interface`, stamped now.
    pub fn online(interface: InterfaceType) -> Self {
        Self {
            is_connected: true,
            interface_type: interface,
            quality: classify_quality(PathStatus::Satisfied, interface),
            last_connected_at: Some(Utc::now()),
        }
    }
}

/// Classify connection quality from the raw path status and interface.
///
/// Pure and deterministic. `Fair` is never produced; it exists for
/// consumers that refine quality from their own measurements.
pub fn classify_quality(status: PathStatus, interface: InterfaceType) -> ConnectionQuality {
    match (status, interface) {
        (PathStatus::Satisfied, InterfaceType::Wifi | InterfaceType::Ethernet) => {
            ConnectionQuality::Excellent
        }
        (PathStatus::Satisfied, InterfaceType::Cellular) => ConnectionQuality::Good,
        _ => ConnectionQuality::Poor,
    }
}

type Listener = Arc<dyn Fn(&ConnectivityState) + Send + Sync>;

/// Tracks reachability and publishes transitions.
///
/// Cheap to share: wrap in an `Arc` and hand it to the
/// [`ApiClient`](crate::ApiClient) and to the platform integration that
/// calls [`update()`](Self::update).
pub struct ConnectivityMonitor {
    state: watch::Sender<ConnectivityState>,
    listeners: Mutex<Vec<Listener>>,
}

impl ConnectivityMonitor {
    /// Create a monitor that starts offline until the first platform event.
    pub fn new() -> Self {
        Self::with_state(ConnectivityState::offline())
    }

    /// Create a monitor that starts connected over an unclassified
    /// interface. For hosts without a platform signal.
    pub fn assume_online() -> Self {
        Self::with_state(ConnectivityState::online(InterfaceType::Other))
    }

    /// Create a monitor with an explicit initial state.
    pub fn with_state(initial: ConnectivityState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Latest snapshot. Never blocks on I/O.
    pub fn current_state(&self) -> ConnectivityState {
        self.state.borrow().clone()
    }

    /// Shorthand for `current_state().is_connected`.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected
    }

    /// Register a callback fired on every published transition.
    ///
    /// Callbacks run synchronously on the thread that delivered the
    /// platform event; keep them short. They may call back into the
    /// monitor: no lock is held while they run.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&ConnectivityState) + Send + Sync + 'static,
    {
        self.lock_listeners().push(Arc::new(listener));
    }

    /// Stream of published states, starting with the current one.
    pub fn subscribe(&self) -> impl Stream<Item = ConnectivityState> + Send + 'static {
        WatchStream::new(self.state.subscribe())
    }

    /// Apply one platform event.
    ///
    /// Returns `true` when the event changed `is_connected` or
    /// `interface_type` and was therefore published.
    pub fn update(&self, update: PathUpdate) -> bool {
        let is_connected = update.status == PathStatus::Satisfied;
        let quality = classify_quality(update.status, update.interface);

        let mut published = None;
        self.state.send_if_modified(|state| {
            if state.is_connected == is_connected && state.interface_type == update.interface {
                return false;
            }
            if is_connected && !state.is_connected {
                state.last_connected_at = Some(Utc::now());
            }
            state.is_connected = is_connected;
            state.interface_type = update.interface;
            state.quality = quality;
            published = Some(state.clone());
            true
        });

        let Some(state) = published else {
            debug!(?update, "connectivity event did not change classification");
            return false;
        };

        info!(
            connected = state.is_connected,
            interface = ?state.interface_type,
            quality = ?state.quality,
            "connectivity changed"
        );
        let listeners: Vec<Listener> = self.lock_listeners().clone();
        for listener in &listeners {
            listener(&state);
        }
        true
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        // A panicking listener must not take connectivity tracking down with it.
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
