//! TCP reachability probe.
//!
//! Feeds a [`ConnectivityMonitor`] on hosts with no OS path monitor. Every
//! `interval` it tries a TCP connect to `target`; success reports
//! `Satisfied`, failure or timeout reports `Unsatisfied`. The interface is
//! reported as configured (defaults to [`InterfaceType::Other`]) because a
//! plain socket cannot tell wifi from cellular.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::{ConnectivityMonitor, InterfaceType, PathStatus, PathUpdate};

/// Probe settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// `host:port` to connect to.
    pub target: String,
    /// Time between probes. Default: 15s.
    pub interval: Duration,
    /// Per-probe connect timeout. Default: 3s.
    pub timeout: Duration,
    /// Interface reported on success.
    pub interface: InterfaceType,
}

impl ProbeConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(3),
            interface: InterfaceType::Other,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interface(mut self, interface: InterfaceType) -> Self {
        self.interface = interface;
        self
    }
}

/// Handle to a running probe task. Dropping it stops the probe.
pub struct ProbeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stop probing and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run one probe and return the resulting path status.
pub async fn probe_once(target: &str, timeout: Duration) -> PathStatus {
    match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
        Ok(Ok(_)) => PathStatus::Satisfied,
        Ok(Err(e)) => {
            debug!(target, error = %e, "reachability probe failed");
            PathStatus::Unsatisfied
        }
        Err(_) => {
            debug!(target, "reachability probe timed out");
            PathStatus::Unsatisfied
        }
    }
}

/// Spawn a background probe feeding `monitor`.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn spawn_tcp_probe(monitor: Arc<ConnectivityMonitor>, config: ProbeConfig) -> ProbeHandle {
    let (tx, mut rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    let status = probe_once(&config.target, config.timeout).await;
                    monitor.update(PathUpdate::new(status, config.interface));
                }
            }
        }
    });
    ProbeHandle {
        shutdown: Some(tx),
        task,
    }
}
