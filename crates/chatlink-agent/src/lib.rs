//! chatlink-agent: forwards a host page's live chat to a local server.
//!
//! # Architecture
//!
//! ```text
//! host page scraper                 this crate                           local chat server
//! ─────────────────                 ──────────────────────────────       ─────────────────
//! stdin JSON lines ──► HostBridge ──► Agent ─── ConnectionManager ─────► ws://127.0.0.1:31418
//!                                       │            ▲       │  id / message
//!                                       │            │       ▼
//!                                       ├── Session ◄┘  active{shouldBeActive}
//!                                       └── CaptureCoordinator ──► HostObserver
//! ```
//!
//! One [`Agent`] per page. Agents own all of their state, so several can run
//! side by side in one process.

pub mod agent;
pub mod bridge;
pub mod manager;
pub mod session;

pub use agent::{Agent, SessionStatus};
pub use bridge::{HostBridge, HostObserver, HostPage, PageEvent};
pub use manager::{ConnectionManager, DialTarget, OpenOutcome};
pub use session::{Effect, Session, SessionEvent};
