//! chatlink-capture: chat capture for the ChatLink agent.
//!
//! The page itself (finding the chat container, reading author and text out
//! of rendered entries, noticing navigation) is somebody else's job. This
//! crate defines the two narrow seams the agent talks through and the
//! [`CaptureCoordinator`] that drives them.
//!
//! # Architecture
//!
//! ```text
//! host page scraper                          chatlink-agent
//! ─────────────────                          ──────────────────────────────
//! PageBridge       ◄── locate / path / id ── ConnectionManager::try_open
//! CaptureObserver  ◄── observe / unobserve ─ CaptureCoordinator::start/stop
//!        │
//!        └── CapturedItem ──► ItemSink ────► CaptureCoordinator::relay ──► `message` packet
//! ```

pub mod coordinator;

use chatlink_core::{session_id_from_path, CaptureError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use coordinator::CaptureCoordinator;

// ── Public types ──────────────────────────────────────────────────────────────

/// Opaque reference to the chat container found in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(pub String);

/// A chat entry as reported by the page, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedItem {
    pub author: Option<String>,
    pub text: Option<String>,
}

impl CapturedItem {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self { author: Some(author.into()), text: Some(text.into()) }
    }
}

/// Where an observer delivers newly rendered chat entries.
pub type ItemSink = mpsc::UnboundedSender<CapturedItem>;

// ── Collaborator seams ────────────────────────────────────────────────────────

/// Read access to the host page.
pub trait PageBridge {
    /// The chat container, if the page currently renders one.
    fn locate_capture_container(&self) -> Option<ContainerHandle>;

    /// Path plus query of the current page, e.g. `/watch?v=abc123`.
    fn current_navigation_path(&self) -> String;

    /// Chat/video id of the current page.
    fn current_session_id(&self) -> Option<String> {
        session_id_from_path(&self.current_navigation_path())
    }
}

/// The mechanism that notices new chat entries in a container.
pub trait CaptureObserver {
    /// Start watching `container`; every new entry goes to `on_item_added`.
    fn observe(&mut self, container: &ContainerHandle, on_item_added: ItemSink) -> Result<(), CaptureError>;

    /// Stop watching. Calling it while not observing is harmless.
    fn unobserve(&mut self);
}
