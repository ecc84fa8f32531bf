//! Deferred release of apartment-bound references.
//!
//! A plain interface pointer must be released in the apartment it was
//! obtained in. When the last handle to a proxy is dropped on another thread,
//! its home reference is posted here and released by the owning thread the
//! next time it pumps the queue.

use std::ptr::NonNull;
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use super::error::{BridgeError, Result};
use crate::com::{release_raw, HResult, RawPtr};

/// A reference waiting to be released on its owning thread.
///
/// Dropping an unprocessed request leaks the reference, never releases it on
/// the wrong thread.
#[derive(Debug)]
pub struct ReleaseRequest {
    instance: NonNull<std::ffi::c_void>,
}

// SAFETY: the pointer is only carried across threads, never dereferenced
// until it is back on the owning thread.
unsafe impl Send for ReleaseRequest {}

impl ReleaseRequest {
    /// Wrap one owned reference.
    ///
    /// # Safety
    ///
    /// `instance` must carry one reference owned by the caller, valid on the
    /// thread that will pump the queue this request is posted to.
    pub unsafe fn new(instance: NonNull<std::ffi::c_void>) -> Self {
        Self { instance }
    }

    /// The pointer to be released
    pub fn as_raw(&self) -> RawPtr {
        self.instance.as_ptr()
    }
}

/// Sending half, held by proxies.
#[derive(Debug, Clone)]
pub struct ReleaseDispatcher {
    tx: Sender<ReleaseRequest>,
    owner: ThreadId,
}

impl ReleaseDispatcher {
    /// Thread that processes posted requests
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Queue `request`. Fails (handing the request back) if the queue is gone.
    pub fn post(&self, request: ReleaseRequest) -> std::result::Result<(), ReleaseRequest> {
        trace!("Posting deferred release of {:p}", request.instance);
        self.tx.send(request).map_err(|e| e.into_inner())
    }
}

/// Receiving half, owned by the thread the references belong to.
#[derive(Debug)]
pub struct ReleaseQueue {
    rx: Receiver<ReleaseRequest>,
    tx: Sender<ReleaseRequest>,
    owner: ThreadId,
}

impl ReleaseQueue {
    /// Queue owned by the calling thread
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            rx,
            tx,
            owner: thread::current().id(),
        }
    }

    /// Owning thread
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// A sender bound to this queue
    pub fn dispatcher(&self) -> ReleaseDispatcher {
        ReleaseDispatcher {
            tx: self.tx.clone(),
            owner: self.owner,
        }
    }

    /// Requests waiting
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Release every queued reference. Must run on the owning thread.
    pub fn pump(&self) -> Result<usize> {
        if thread::current().id() != self.owner {
            return Err(BridgeError::Status {
                operation: "ReleaseQueue::pump",
                status: HResult::RPC_E_WRONG_THREAD,
            });
        }

        let mut released = 0;
        while let Ok(request) = self.rx.try_recv() {
            // SAFETY: on the owning thread; the request carries one reference.
            let remaining = unsafe { release_raw(request.as_raw()) };
            trace!("Deferred release of {:p} -> {}", request.instance, remaining);
            released += 1;
        }
        if released > 0 {
            debug!("Released {} deferred reference(s)", released);
        }
        Ok(released)
    }
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReleaseQueue {
    fn drop(&mut self) {
        if thread::current().id() == self.owner {
            let _ = self.pump();
        } else if !self.rx.is_empty() {
            warn!(
                "Release queue dropped off its owning thread with {} pending reference(s); leaking them",
                self.rx.len()
            );
        }
    }
}
