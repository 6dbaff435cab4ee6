//! Reconfiguration bridge
//!
//! Platform change notifications arrive on whatever thread the platform
//! chooses. The callback handed to the platform is a plain function that
//! receives an integer handle; it looks the handle up in a process-wide
//! registry and forwards a refresh request over a channel to the thread that
//! owns the bridge. All discovery and listener calls happen on that thread.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::catalog::ModeCatalog;
use crate::platform::{ChangeFlags, ChangeNotifier, DisplayQuery, PlatformResult};
use crate::types::{Display, DisplayId};

/// Why a refresh was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    /// A display was added, removed or is being reconfigured
    Reconfiguration { display: DisplayId, flags: ChangeFlags },
    /// The user asked for the list to be rebuilt
    UserRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub reason: RefreshReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    PendingRefresh,
}

/// Handle for enqueuing a user-initiated refresh from the owning side
#[derive(Debug, Clone)]
pub struct RefreshRequester {
    sender: Sender<RefreshRequest>,
}

impl RefreshRequester {
    /// Returns false once the bridge is gone
    pub fn request(&self) -> bool {
        self.sender
            .send(RefreshRequest {
                reason: RefreshReason::UserRequested,
            })
            .is_ok()
    }
}

type RefreshListener = Box<dyn FnMut(&RefreshRequest, &[Display])>;

#[derive(Default)]
struct Registry {
    next_handle: u64,
    senders: HashMap<u64, Sender<RefreshRequest>>,
}

fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Mutex::new(Registry::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Entry point handed to the platform; may run on any thread
fn on_reconfiguration(id: DisplayId, flags: ChangeFlags, handle: u64) {
    if !flags.requests_refresh() {
        trace!(display = %id, flags = ?flags, "Ignoring display change");
        return;
    }

    let sender = registry().senders.get(&handle).cloned();
    match sender {
        Some(sender) => {
            debug!(display = %id, flags = ?flags, handle, "Display reconfigured, requesting refresh");
            let request = RefreshRequest {
                reason: RefreshReason::Reconfiguration { display: id, flags },
            };
            if sender.send(request).is_err() {
                debug!(handle, "Bridge receiver gone, dropping refresh request");
            }
        }
        None => debug!(handle, "No live bridge for handle, dropping notification"),
    }
}

/// Subscription to display reconfiguration, owned by one thread
pub struct ReconfigurationBridge<N: ChangeNotifier> {
    notifier: N,
    handle: u64,
    sender: Sender<RefreshRequest>,
    receiver: Receiver<RefreshRequest>,
    state: BridgeState,
    listeners: Vec<RefreshListener>,
    subscribed: bool,
}

impl<N: ChangeNotifier> ReconfigurationBridge<N> {
    /// Register with the platform; the subscription lasts until drop or `unsubscribe`
    pub fn subscribe(mut notifier: N) -> PlatformResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = {
            let mut registry = registry();
            registry.next_handle += 1;
            let handle = registry.next_handle;
            registry.senders.insert(handle, sender.clone());
            handle
        };

        if let Err(e) = notifier.register(on_reconfiguration, handle) {
            registry().senders.remove(&handle);
            return Err(e);
        }
        info!(handle, "Subscribed to display reconfiguration");

        Ok(Self {
            notifier,
            handle,
            sender,
            receiver,
            state: BridgeState::Idle,
            listeners: Vec::new(),
            subscribed: true,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn requester(&self) -> RefreshRequester {
        RefreshRequester {
            sender: self.sender.clone(),
        }
    }

    /// Be told about every fresh display list
    pub fn on_refresh(&mut self, listener: impl FnMut(&RefreshRequest, &[Display]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Take the next queued request without blocking
    pub fn try_next(&mut self) -> Option<RefreshRequest> {
        match self.receiver.try_recv() {
            Ok(request) => Some(self.pending(request)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next request
    pub fn next_timeout(&mut self, timeout: Duration) -> Option<RefreshRequest> {
        match self.receiver.recv_timeout(timeout) {
            Ok(request) => Some(self.pending(request)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn pending(&mut self, request: RefreshRequest) -> RefreshRequest {
        self.state = BridgeState::PendingRefresh;
        request
    }

    /// Answer `request` with a fresh discovery pass and notify listeners
    pub fn refresh<Q: DisplayQuery>(
        &mut self,
        request: &RefreshRequest,
        catalog: &ModeCatalog<Q>,
    ) -> Vec<Display> {
        let displays = catalog.discover();
        debug!(reason = ?request.reason, displays = displays.len(), "Display list refreshed");
        for listener in &mut self.listeners {
            listener(request, &displays);
        }
        self.state = BridgeState::Idle;
        displays
    }

    /// Wait for one request and answer it; false if none arrived in time
    pub fn process_next<Q: DisplayQuery>(
        &mut self,
        catalog: &ModeCatalog<Q>,
        timeout: Duration,
    ) -> bool {
        match self.next_timeout(timeout) {
            Some(request) => {
                self.refresh(&request, catalog);
                true
            }
            None => false,
        }
    }

    /// Release the platform subscription
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.subscribed {
            return;
        }
        self.subscribed = false;
        self.notifier.unregister(on_reconfiguration, self.handle);
        registry().senders.remove(&self.handle);
        info!(handle = self.handle, "Unsubscribed from display reconfiguration");
    }
}

impl<N: ChangeNotifier> Drop for ReconfigurationBridge<N> {
    fn drop(&mut self) {
        if self.subscribed {
            warn!(handle = self.handle, "Bridge dropped while subscribed, unsubscribing");
        }
        self.teardown();
    }
}
