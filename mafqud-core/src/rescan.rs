use crate::config::MatchSettings;
use crate::engine::MatchEngine;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

/// Periodic driver that re-runs the match engine against all active reports
/// on a fixed interval.
///
/// Settings are reloaded before every batch, so admin edits (including the
/// interval itself) take effect on the next iteration. Cancellation happens
/// between iterations, never mid-batch.
pub struct RescanScheduler {
    stop_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RescanScheduler {
    /// Spawn the scheduler thread. The first batch runs immediately.
    pub fn start<F>(engine: Arc<MatchEngine>, load_settings: F) -> Self
    where
        F: Fn() -> MatchSettings + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || loop {
            let settings = load_settings();

            match engine.rescan_all(&settings) {
                Ok(stats) => log::debug!(
                    "Rescan batch complete: {} reports, {} new matches",
                    stats.reports_scanned,
                    stats.matches_created
                ),
                Err(e) => log::error!("Rescan batch failed: {}", e),
            }

            match stop_rx.recv_timeout(settings.rescan_interval()) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    log::info!("Rescan scheduler stopping");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Request a stop and wait for the current batch (if any) to finish
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for RescanScheduler {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}
