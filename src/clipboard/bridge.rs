//! Clipboard bridge
//!
//! The public entry point: read the clipboard as a [`DataObject`], install a
//! local or remote object on it, clear it and flush it. Every clipboard
//! operation runs synchronously on the calling thread and requires a
//! single-threaded apartment.
//!
//! A bridge is bound to the thread that created it. References that proxies
//! could not release on their home thread are queued and released by
//! [`ClipboardBridge::pump_releases`], which that thread should call from its
//! message loop.

use std::any::Any;
use std::fmt;
use std::ptr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::agile::AgileReference;
use super::data_object::LocalDataObject;
use super::error::{BridgeError, Result};
use super::formats::FormatRegistry;
use super::proxy::RemoteDataObjectProxy;
use super::release::ReleaseQueue;
use super::wrapper::LocalDataObjectWrapper;
use crate::com::{ComRef, Completion, HResult, RawPtr, IID_IDATAOBJECT};
use crate::platform::{require_single_threaded, OlePlatform};

/// Tunables for [`ClipboardBridge`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Extra `OleGetClipboard` attempts while another process holds the
    /// clipboard open (CLIPBRD_E_CANT_OPEN). 0 disables retrying.
    pub open_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            open_retries: 0,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// What [`ClipboardBridge::get`] found on the clipboard
#[derive(Clone)]
pub enum ClipboardObject {
    /// One of this process's own objects, returned directly
    Local(LocalDataObject),
    /// A foreign object, reached through a proxy
    Remote(Arc<RemoteDataObjectProxy>),
}

impl ClipboardObject {
    /// The object as a [`DataObject`](super::DataObject)
    pub fn data_object(&self) -> LocalDataObject {
        match self {
            Self::Local(object) => object.clone(),
            Self::Remote(proxy) => proxy.clone(),
        }
    }

    /// Returns true if the clipboard held one of our own objects
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The local object, if that is what the clipboard held
    pub fn into_local(self) -> Option<LocalDataObject> {
        match self {
            Self::Local(object) => Some(object),
            Self::Remote(_) => None,
        }
    }
}

impl fmt::Debug for ClipboardObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(object) => f
                .debug_tuple("Local")
                .field(&Arc::as_ptr(object).cast::<()>())
                .finish(),
            Self::Remote(proxy) => f.debug_tuple("Remote").field(proxy).finish(),
        }
    }
}

/// What [`ClipboardBridge::set`] can install
pub enum ClipboardContent {
    /// Exposed through a fresh [`LocalDataObjectWrapper`]
    Local(LocalDataObject),
    /// Installed through its own underlying handle
    Remote(Arc<RemoteDataObjectProxy>),
    /// Any other object; always rejected as not implemented
    Unsupported(Box<dyn Any + Send>),
}

impl From<ClipboardObject> for ClipboardContent {
    fn from(object: ClipboardObject) -> Self {
        match object {
            ClipboardObject::Local(object) => Self::Local(object),
            ClipboardObject::Remote(proxy) => Self::Remote(proxy),
        }
    }
}

impl From<LocalDataObject> for ClipboardContent {
    fn from(object: LocalDataObject) -> Self {
        Self::Local(object)
    }
}

impl fmt::Debug for ClipboardContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(_) => f.write_str("Local"),
            Self::Remote(proxy) => f.debug_tuple("Remote").field(proxy).finish(),
            Self::Unsupported(_) => f.write_str("Unsupported"),
        }
    }
}

fn check(operation: &'static str, status: HResult) -> Result<Completion> {
    status
        .check()
        .map_err(|status| BridgeError::from_status(operation, status))
}

/// The clipboard, bound to the creating thread
pub struct ClipboardBridge {
    platform: Arc<dyn OlePlatform>,
    formats: Arc<dyn FormatRegistry>,
    releases: ReleaseQueue,
    options: BridgeOptions,
}

impl ClipboardBridge {
    /// Bridge with default options
    pub fn new(platform: Arc<dyn OlePlatform>, formats: Arc<dyn FormatRegistry>) -> Self {
        Self::with_options(platform, formats, BridgeOptions::default())
    }

    /// Bridge with explicit options
    pub fn with_options(
        platform: Arc<dyn OlePlatform>,
        formats: Arc<dyn FormatRegistry>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            platform,
            formats,
            releases: ReleaseQueue::new(),
            options,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Format registry used for canonicalization
    pub fn formats(&self) -> &Arc<dyn FormatRegistry> {
        &self.formats
    }

    /// `OleInitialize` for the calling thread. "Already initialized" is
    /// reported as an informational success.
    pub fn initialize(&self) -> Result<Completion> {
        let completion = check("OleInitialize", self.platform.initialize())?;
        if completion.is_informational() {
            debug!("OLE already initialized on this thread ({})", completion.status());
        } else {
            info!("OLE initialized, apartment is {}", self.platform.apartment_state());
        }
        Ok(completion)
    }

    /// The current clipboard object.
    ///
    /// Returns our own local object directly if the clipboard holds one of
    /// our wrappers; otherwise a proxy over the foreign object.
    pub fn get(&self) -> Result<ClipboardObject> {
        require_single_threaded(self.platform.as_ref())?;
        let instance = self.open_clipboard()?;

        // SAFETY: `instance` is a live interface pointer.
        if let Some(local) = unsafe { LocalDataObjectWrapper::try_identify(instance.as_raw()) } {
            debug!("Clipboard holds one of our own data objects");
            return Ok(ClipboardObject::Local(local));
        }

        // SAFETY: a live IDataObject valid on this thread.
        let agile = unsafe {
            AgileReference::create(self.platform.as_ref(), &IID_IDATAOBJECT, instance.as_raw())
        }?;
        drop(instance);

        let proxy = RemoteDataObjectProxy::new(
            agile,
            self.platform.clone(),
            self.formats.clone(),
            Some(self.releases.dispatcher()),
        )?;
        debug!("Clipboard holds a foreign data object, using a proxy");
        Ok(ClipboardObject::Remote(Arc::new(proxy)))
    }

    /// Install `content` on the clipboard; `None` clears it.
    pub fn set(&self, content: Option<ClipboardContent>) -> Result<()> {
        require_single_threaded(self.platform.as_ref())?;
        let status = match content {
            None => {
                debug!("Clearing clipboard");
                // SAFETY: null clears the clipboard.
                unsafe { self.platform.set_clipboard(ptr::null_mut()) }
            }
            Some(ClipboardContent::Remote(proxy)) => {
                debug!("Installing foreign data object back on the clipboard");
                proxy.with_context_handle(|handle| {
                    // SAFETY: the handle is valid on this thread for the call.
                    unsafe { self.platform.set_clipboard(handle) }
                })?
            }
            Some(ClipboardContent::Local(object)) => {
                let wrapper = LocalDataObjectWrapper::create(object)?;
                debug!("Installing local data object through {:?}", wrapper);
                // SAFETY: the wrapper is live; the platform takes its own
                // reference and ours is released when `wrapper` drops.
                unsafe { self.platform.set_clipboard(wrapper.as_raw()) }
            }
            Some(ClipboardContent::Unsupported(_)) => {
                return Err(BridgeError::NotImplemented(
                    "placing objects other than data objects on the clipboard",
                ));
            }
        };
        check("OleSetClipboard", status).map(|_| ())
    }

    /// `OleFlushClipboard`: keep the current contents after this process
    /// exits.
    pub fn flush(&self) -> Result<Completion> {
        require_single_threaded(self.platform.as_ref())?;
        check("OleFlushClipboard", self.platform.flush_clipboard())
    }

    /// Release references that proxies handed back from other threads.
    pub fn pump_releases(&self) -> Result<usize> {
        self.releases.pump()
    }

    /// Number of references waiting for [`Self::pump_releases`]
    pub fn pending_releases(&self) -> usize {
        self.releases.pending()
    }

    fn open_clipboard(&self) -> Result<ComRef> {
        let mut attempt = 0;
        loop {
            let mut raw: RawPtr = ptr::null_mut();
            let status = self.platform.get_clipboard(&mut raw);
            if status.is_success() {
                // SAFETY: a successful OleGetClipboard hands us one reference.
                return unsafe { ComRef::from_raw(raw) }
                    .ok_or_else(|| BridgeError::from_status("OleGetClipboard", HResult::E_POINTER));
            }

            if status == HResult::CLIPBRD_E_CANT_OPEN && attempt < self.options.open_retries {
                attempt += 1;
                warn!(
                    "Clipboard busy, retrying OleGetClipboard ({}/{}) in {:?}",
                    attempt, self.options.open_retries, self.options.retry_delay
                );
                thread::sleep(self.options.retry_delay);
                continue;
            }
            return Err(BridgeError::from_status("OleGetClipboard", status));
        }
    }
}

impl fmt::Debug for ClipboardBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipboardBridge")
            .field("owner", &self.releases.owner())
            .field("pending_releases", &self.releases.pending())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_never_retry() {
        let options = BridgeOptions::default();
        assert_eq!(options.open_retries, 0);
        assert_eq!(options.retry_delay, Duration::from_millis(100));
    }
}
