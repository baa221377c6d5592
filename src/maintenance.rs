use {
    crate::{Node, RingError},
    parking_lot::{Condvar, Mutex},
    std::{
        sync::Arc,
        thread::{self, JoinHandle},
        time::Duration,
    },
    tracing::{debug, warn},
};

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

/// Background maintenance of a single node.
///
/// Every tick runs [`stabilize`](Node::stabilize) followed by one
/// [`fix_fingers`](Node::fix_fingers) step. Failures are logged and retried
/// on the next tick. The loop ends when the handle is stopped or dropped, or
/// once the node has left the ring.
pub struct Maintainer {
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Maintainer {
    /// Spawns maintenance for `node`, ticking at the ring's configured
    /// interval.
    pub fn spawn(node: Node) -> Self {
        let interval = node.ring().config().maintenance_interval();
        Self::spawn_with_interval(node, interval)
    }

    /// Spawns maintenance for `node` with a custom tick interval.
    pub fn spawn_with_interval(node: Node, interval: Duration) -> Self {
        let signal = Arc::new(Signal::default());
        let handle = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || run(node, interval, &signal))
        };
        Self {
            signal,
            handle: Some(handle),
        }
    }

    /// Whether the maintenance loop is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wakeup.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("maintenance thread panicked");
            }
        }
    }
}

impl Drop for Maintainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(node: Node, interval: Duration, signal: &Signal) {
    debug!(node = node.id(), ?interval, "maintenance started");
    loop {
        match node.stabilize().and_then(|_| node.fix_fingers()) {
            Ok(()) => {}
            Err(RingError::UnknownNode(id)) if id == node.id() => {
                debug!(node = node.id(), "node left the ring, maintenance stops");
                return;
            }
            Err(RingError::Detached(id)) if id == node.id() => {
                debug!(node = node.id(), "node not joined yet");
            }
            Err(err) => warn!(node = node.id(), %err, "maintenance tick failed"),
        }

        let mut stopped = signal.stopped.lock();
        if !*stopped {
            signal.wakeup.wait_for(&mut stopped, interval);
        }
        if *stopped {
            debug!(node = node.id(), "maintenance stopped");
            return;
        }
    }
}
