//! Wake-up channel from the build refresher to the artifact archiver.
//!
//! Holds at most one pending wake. The archiver re-scans the ledger every time
//! it wakes, so a wake sent while another is pending carries no extra work and
//! is dropped.

use tokio::sync::mpsc;

/// Create a connected sender/receiver pair with room for one pending wake
pub fn archive_signal() -> (WakeSender, WakeReceiver) {
  let (tx, rx) = mpsc::channel(1);
  (WakeSender { tx }, WakeReceiver { rx })
}

#[derive(Clone)]
pub struct WakeSender {
  tx: mpsc::Sender<()>,
}

impl WakeSender {
  /// Queue a wake without blocking.
  ///
  /// Returns false if a wake was already pending or the archiver has gone
  /// away; either way nothing is queued.
  pub fn wake(&self) -> bool {
    self.tx.try_send(()).is_ok()
  }
}

pub struct WakeReceiver {
  rx: mpsc::Receiver<()>,
}

impl WakeReceiver {
  /// Block until woken. Returns false once every sender is dropped and no
  /// wake is pending.
  pub async fn wait(&mut self) -> bool {
    self.rx.recv().await.is_some()
  }
}
