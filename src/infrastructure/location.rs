//! Location Feed
//!
//! The observer position is produced outside this crate; the session only
//! reads the latest value and listens for updates.

use crate::domain::models::Coordinates;
use tokio::sync::watch;

pub trait LocationFeed: Send + Sync {
    /// Most recent position, if one has been received.
    fn latest(&self) -> Option<Coordinates>;

    /// Receiver that is notified on every position update.
    fn subscribe(&self) -> watch::Receiver<Option<Coordinates>>;
}

/// Location feed backed by a watch channel; no history is kept.
#[derive(Debug)]
pub struct WatchLocationFeed {
    sender: watch::Sender<Option<Coordinates>>,
}

impl WatchLocationFeed {
    pub fn new(initial: Option<Coordinates>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn publish(&self, coordinates: Coordinates) {
        self.sender.send_replace(Some(coordinates));
    }

    pub fn clear(&self) {
        self.sender.send_replace(None);
    }
}

impl Default for WatchLocationFeed {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LocationFeed for WatchLocationFeed {
    fn latest(&self) -> Option<Coordinates> {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Coordinates>> {
        self.sender.subscribe()
    }
}
