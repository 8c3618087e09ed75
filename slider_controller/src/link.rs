use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, info};
use utilities::{applet::Applet, metronome::Metronome};

use crate::hardware::{Clock, Link};

/// Outgoing lines fanned out to every connected controller.
#[derive(Debug, Clone)]
pub struct BroadcastLink {
    lines: broadcast::Sender<String>,
    clients: Arc<AtomicUsize>,
}

impl BroadcastLink {
    pub fn new(capacity: usize) -> Self {
        let (lines, _) = broadcast::channel(capacity);
        Self {
            lines,
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.lines.subscribe()
    }

    /// Counts a client as connected until the guard is dropped.
    pub fn connect(&self) -> ClientGuard {
        self.clients.fetch_add(1, Ordering::SeqCst);
        ClientGuard {
            clients: self.clients.clone(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }
}

impl Link for BroadcastLink {
    fn send_line(&mut self, line: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.lines.send(line.to_string()).is_ok()
    }

    fn is_connected(&self) -> bool {
        self.client_count() > 0
    }
}

#[derive(Debug)]
pub struct ClientGuard {
    clients: Arc<AtomicUsize>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.clients.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Watches the link for connects and disconnects and owns the `b` target:
/// `bs<text>` sends `<text>` to the controller as is.
pub struct LinkMonitor<L: Link, C: Clock> {
    link: L,
    clock: C,
    check: Metronome,
    connected: bool,
}

impl<L: Link, C: Clock> LinkMonitor<L, C> {
    pub fn new(link: L, clock: C, check_period_ms: u64) -> Self {
        let check = Metronome::new(check_period_ms, clock.now_ms());
        Self {
            link,
            clock,
            check,
            connected: false,
        }
    }

    pub fn connected(&self) -> bool {
        self.connected
    }
}

impl<L: Link, C: Clock> Applet for LinkMonitor<L, C> {
    fn name(&self) -> &str {
        "Link"
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        self.check.restart(self.clock.now_ms());
        self.connected = self.link.is_connected();
        Ok(())
    }

    fn run(&mut self) {
        if !self.check.ready(self.clock.now_ms()) {
            return;
        }

        let connected = self.link.is_connected();
        if connected != self.connected {
            self.connected = connected;
            if connected {
                info!("Controller connected");
            } else {
                info!("Controller disconnected");
            }
        }
    }

    fn command(&mut self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix('b') else {
            return false;
        };

        if let Some(text) = rest.strip_prefix('s').filter(|text| !text.is_empty()) {
            if !self.link.send_line(text) {
                debug!("Nobody connected to receive {:?}", text);
            }
        }
        true
    }
}
