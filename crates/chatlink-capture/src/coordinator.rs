//! `CaptureCoordinator`: turns the capture subsystem on and off and relays
//! what it captures as outbound `message` packets.

use chatlink_core::{CaptureError, ChatEntry, Packet};
use tracing::{debug, info, warn};

use crate::{CaptureObserver, CapturedItem, ItemSink, PageBridge};

pub struct CaptureCoordinator<O> {
    observer: O,
    item_tx: ItemSink,
    observing: bool,
    relayed: u64,
}

impl<O: CaptureObserver> CaptureCoordinator<O> {
    /// `item_tx` is handed to the observer on every `start`.
    pub fn new(observer: O, item_tx: ItemSink) -> Self {
        Self { observer, item_tx, observing: false, relayed: 0 }
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Number of `message` packets handed to the connection so far.
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    /// Record one relayed packet as sent.
    pub fn record_sent(&mut self) {
        self.relayed += 1;
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Locate the chat container and start observing it.
    pub fn start(&mut self, page: &dyn PageBridge) -> Result<(), CaptureError> {
        if self.observing {
            debug!("Capture already running");
            return Ok(());
        }
        let Some(container) = page.locate_capture_container() else {
            warn!("Capture not started: chat container not found");
            return Err(CaptureError::ContainerMissing);
        };
        if let Err(e) = self.observer.observe(&container, self.item_tx.clone()) {
            warn!("Capture not started: {}", e);
            return Err(e);
        }
        self.observing = true;
        info!("Capture started on container {:?}", container.0);
        Ok(())
    }

    /// Stop observing. No-op when not running.
    pub fn stop(&mut self) {
        if !self.observing {
            return;
        }
        self.observer.unobserve();
        self.observing = false;
        info!("Capture stopped ({} message(s) relayed so far)", self.relayed);
    }

    /// Wire form of the `message` packet for `item`, or `None` when the item
    /// is dropped (session inactive or invalid item).
    pub fn relay(&self, active: bool, item: CapturedItem) -> Option<String> {
        if !active {
            debug!("Captured item ignored: session inactive");
            return None;
        }
        let entry = match validate(item) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Dropping captured item: {}", e);
                return None;
            }
        };
        match Packet::encode_message(&entry.author, &entry.text) {
            Ok(wire) => Some(wire),
            Err(e) => {
                warn!("Dropping captured item: {}", e);
                None
            }
        }
    }
}

/// Both author and text must carry visible content.
pub fn validate(item: CapturedItem) -> Result<ChatEntry, CaptureError> {
    let author = item
        .author
        .filter(|a| !a.trim().is_empty())
        .ok_or(CaptureError::MissingAuthor)?;
    let text = item
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or(CaptureError::MissingText)?;
    Ok(ChatEntry { author, text })
}
