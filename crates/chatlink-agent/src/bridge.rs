//! Stdin page bridge.
//!
//! Lets any external page scraper drive the agent by writing one JSON
//! object per line to its stdin:
//!
//! ```text
//! {"kind":"navigated","path":"/watch?v=abc123"}
//! {"kind":"container","present":true}
//! {"kind":"chat","author":"alice","text":"hi"}
//! ```
//!
//! `navigated` updates the page and fires the navigation signal,
//! `container` toggles whether the chat container is locatable, and `chat`
//! reports a newly rendered entry to whoever is observing. A container that
//! disappears and comes back keeps its observer.

use std::sync::{Arc, Mutex};

use chatlink_capture::{CaptureObserver, CapturedItem, ContainerHandle, ItemSink, PageBridge};
use chatlink_core::CaptureError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Container name reported while the scraper says the chat is present.
const CONTAINER_NAME: &str = "live-chat";

// ── Page events ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageEvent {
    Navigated {
        path: String,
    },
    Container {
        present: bool,
    },
    Chat {
        #[serde(default)]
        author: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}

// ── Shared page state ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PageState {
    path: String,
    container_present: bool,
    observer: Option<ItemSink>,
}

/// [`PageBridge`] view of the scraper-reported page.
#[derive(Debug, Clone)]
pub struct HostPage {
    state: Arc<Mutex<PageState>>,
}

/// [`CaptureObserver`] fed by the scraper's `chat` lines.
#[derive(Debug, Clone)]
pub struct HostObserver {
    state: Arc<Mutex<PageState>>,
}

impl PageBridge for HostPage {
    fn locate_capture_container(&self) -> Option<ContainerHandle> {
        let state = self.state.lock().ok()?;
        state.container_present.then(|| ContainerHandle(CONTAINER_NAME.to_owned()))
    }

    fn current_navigation_path(&self) -> String {
        self.state.lock().map(|s| s.path.clone()).unwrap_or_default()
    }
}

impl CaptureObserver for HostObserver {
    fn observe(&mut self, container: &ContainerHandle, on_item_added: ItemSink) -> Result<(), CaptureError> {
        let mut state = self.state.lock().map_err(|_| CaptureError::ObserveFailed {
            reason: "page state poisoned".to_owned(),
        })?;
        if !state.container_present {
            return Err(CaptureError::ContainerMissing);
        }
        debug!("Observing {}", container.0);
        state.observer = Some(on_item_added);
        Ok(())
    }

    fn unobserve(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.observer = None;
        }
    }
}

// ── Bridge ────────────────────────────────────────────────────────────────────

/// Page, observer and navigation signal sharing one scraper-fed state.
pub struct HostBridge {
    pub page: HostPage,
    pub observer: HostObserver,
    state: Arc<Mutex<PageState>>,
    navigation_tx: mpsc::UnboundedSender<String>,
}

impl HostBridge {
    /// Bridge starting at `initial_path` with no chat container.
    pub fn new(initial_path: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let state = Arc::new(Mutex::new(PageState {
            path: initial_path.into(),
            ..Default::default()
        }));
        let (navigation_tx, navigation_rx) = mpsc::unbounded_channel();
        let bridge = Self {
            page: HostPage { state: Arc::clone(&state) },
            observer: HostObserver { state: Arc::clone(&state) },
            state,
            navigation_tx,
        };
        (bridge, navigation_rx)
    }

    /// Apply one scraper event to the shared page state.
    pub fn apply(&self, event: PageEvent) {
        let Ok(mut state) = self.state.lock() else {
            warn!("Page state poisoned; event dropped");
            return;
        };
        match event {
            PageEvent::Navigated { path } => {
                if state.path == path {
                    return;
                }
                state.path = path.clone();
                // A new page renders a new chat.
                state.container_present = false;
                state.observer = None;
                drop(state);
                let _ = self.navigation_tx.send(path);
            }
            // The observer stays attached across container flaps; only the
            // coordinator detaches it.
            PageEvent::Container { present } => state.container_present = present,
            PageEvent::Chat { author, text } => match &state.observer {
                Some(sink) => {
                    let _ = sink.send(CapturedItem { author, text });
                }
                None => debug!("Chat entry seen while not observing"),
            },
        }
    }

    /// Feed the bridge from `reader` until EOF. Dropping the bridge at the end
    /// closes the navigation signal, which stops the agent.
    pub async fn pump<R>(self, reader: R)
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PageEvent>(line) {
                        Ok(event) => self.apply(event),
                        Err(e) => warn!("Ignoring page event {:?}: {}", line, e),
                    }
                }
                Ok(None) => {
                    info!("Page input closed");
                    return;
                }
                Err(e) => {
                    warn!("Page input read error: {}", e);
                    return;
                }
            }
        }
    }

    /// Spawn [`pump`](Self::pump) over the process's stdin.
    pub fn spawn_stdin(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.pump(BufReader::new(tokio::io::stdin())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatlink_capture::CaptureCoordinator;

    #[test]
    fn page_events_deserialize_from_tagged_json() {
        let nav: PageEvent = serde_json::from_str(r#"{"kind":"navigated","path":"/watch?v=abc123"}"#).unwrap();
        assert_eq!(nav, PageEvent::Navigated { path: "/watch?v=abc123".to_owned() });

        let chat: PageEvent = serde_json::from_str(r#"{"kind":"chat","author":"alice"}"#).unwrap();
        assert_eq!(chat, PageEvent::Chat { author: Some("alice".to_owned()), text: None });
    }

    #[test]
    fn navigation_updates_page_and_signals() {
        let (bridge, mut nav_rx) = HostBridge::new("/");
        assert_eq!(bridge.page.current_session_id(), None);

        bridge.apply(PageEvent::Navigated { path: "/watch?v=abc123".to_owned() });
        bridge.apply(PageEvent::Navigated { path: "/watch?v=abc123".to_owned() });
        assert_eq!(nav_rx.try_recv().unwrap(), "/watch?v=abc123");
        assert!(nav_rx.try_recv().is_err());
        assert_eq!(bridge.page.current_session_id().as_deref(), Some("abc123"));
    }

    #[test]
    fn chat_reaches_the_observer_only_while_observing() {
        let (bridge, _nav_rx) = HostBridge::new("/watch?v=abc123");
        let mut observer = bridge.observer.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let container = ContainerHandle(CONTAINER_NAME.to_owned());
        assert_eq!(observer.observe(&container, tx.clone()), Err(CaptureError::ContainerMissing));

        bridge.apply(PageEvent::Container { present: true });
        assert_eq!(bridge.page.locate_capture_container(), Some(container.clone()));
        observer.observe(&container, tx).unwrap();

        bridge.apply(PageEvent::Chat { author: Some("alice".into()), text: Some("hi".into()) });
        assert_eq!(rx.try_recv().unwrap(), CapturedItem::new("alice", "hi"));

        observer.unobserve();
        bridge.apply(PageEvent::Chat { author: Some("bob".into()), text: Some("late".into()) });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn armed_capture_survives_container_flap() {
        let (bridge, _nav_rx) = HostBridge::new("/watch?v=abc123");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut coord = CaptureCoordinator::new(bridge.observer.clone(), tx);

        bridge.apply(PageEvent::Container { present: true });
        coord.start(&bridge.page).unwrap();

        bridge.apply(PageEvent::Container { present: false });
        assert_eq!(bridge.page.locate_capture_container(), None);
        bridge.apply(PageEvent::Container { present: true });
        coord.start(&bridge.page).unwrap();
        assert!(coord.is_observing());

        bridge.apply(PageEvent::Chat { author: Some("alice".into()), text: Some("hi".into()) });
        assert_eq!(rx.try_recv().unwrap(), CapturedItem::new("alice", "hi"));

        coord.stop();
        bridge.apply(PageEvent::Chat { author: Some("bob".into()), text: Some("late".into()) });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn pump_applies_lines_and_skips_garbage() {
        let (bridge, mut nav_rx) = HostBridge::new("/");
        let page = bridge.page.clone();
        let input = b"{\"kind\":\"navigated\",\"path\":\"/watch?v=xyz789\"}\n\nnot json\n{\"kind\":\"container\",\"present\":true}\n";

        bridge.pump(&input[..]).await;

        assert_eq!(nav_rx.recv().await.as_deref(), Some("/watch?v=xyz789"));
        // Bridge dropped at EOF: the signal is closed.
        assert_eq!(nav_rx.recv().await, None);
        assert!(page.locate_capture_container().is_some());
    }
}
