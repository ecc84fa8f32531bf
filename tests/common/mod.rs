//! Shared fakes for the integration tests.
//!
//! A hand-built foreign IDataObject, a hand-built IAgileReference, an
//! in-memory [`OlePlatform`] whose apartments are assigned per thread, and a
//! mockall [`FormatRegistry`].

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use mockall::mock;
use parking_lot::Mutex;

use ole_clipboard_bridge::clipboard::{
    DataObject, FormatDescriptor, FormatRegistry, MediumKind, Presence, Result, TransferMedium,
};
use ole_clipboard_bridge::com::{
    add_ref_raw, release_raw, vtable_of, Bool, ComRef, FormatEtc, Guid, HResult,
    IAgileReferenceVtbl, IDataObjectVtbl, IUnknownVtbl, RawPtr, StgMedium, IID_IDATAOBJECT,
    IID_IUNKNOWN,
};
use ole_clipboard_bridge::platform::{AgileReferenceOptions, ApartmentState, OlePlatform};

/// Payload handle the fake object hands out for `id`
pub fn fake_payload(id: u16) -> RawPtr {
    (0x5000 + id as usize) as RawPtr
}

/// Current reference count of any live protocol object.
///
/// # Safety
///
/// `ptr` must be a live interface pointer.
pub unsafe fn ref_count(ptr: RawPtr) -> u32 {
    unsafe {
        add_ref_raw(ptr);
        release_raw(ptr)
    }
}

// =============================================================================
// Foreign IDataObject
// =============================================================================

/// What a fake foreign data object has seen
#[derive(Default)]
pub struct FakeState {
    accepted: Mutex<HashSet<u16>>,
    /// Format ids passed to QueryGetData, in order
    pub queried: Mutex<Vec<u16>>,
    /// GetData calls
    pub get_calls: AtomicUsize,
    /// (format id, release flag) for each SetData call
    pub set_calls: Mutex<Vec<(u16, bool)>>,
    /// Set once the last reference is released
    pub destroyed: AtomicBool,
}

impl FakeState {
    /// Start offering `id`
    pub fn accept(&self, id: u16) {
        self.accepted.lock().insert(id);
    }

    /// QueryGetData calls so far
    pub fn query_count(&self) -> usize {
        self.queried.lock().len()
    }

    fn offers(&self, id: u16) -> bool {
        self.accepted.lock().contains(&id)
    }
}

#[repr(C)]
struct FakeDataObject {
    vtable: &'static IDataObjectVtbl,
    refs: AtomicU32,
    state: Arc<FakeState>,
}

static FAKE_DATA_OBJECT_VTBL: IDataObjectVtbl = IDataObjectVtbl {
    base: IUnknownVtbl {
        query_interface: fake_query_interface,
        add_ref: fake_add_ref,
        release: fake_release,
    },
    get_data: fake_get_data,
    get_data_here: fake_get_data_here,
    query_get_data: fake_query_get_data,
    get_canonical_format_etc: fake_get_canonical_format_etc,
    set_data: fake_set_data,
    enum_format_etc: fake_enum,
    d_advise: fake_d_advise,
    d_unadvise: fake_d_unadvise,
    enum_d_advise: fake_enum_d_advise,
};

/// A foreign data object offering `accepted`. The returned reference is the
/// creation reference.
pub fn fake_data_object(accepted: &[u16]) -> (ComRef, Arc<FakeState>) {
    let state = Arc::new(FakeState::default());
    for id in accepted {
        state.accept(*id);
    }
    let object = Box::new(FakeDataObject {
        vtable: &FAKE_DATA_OBJECT_VTBL,
        refs: AtomicU32::new(1),
        state: state.clone(),
    });
    let raw = Box::into_raw(object) as RawPtr;
    let instance = unsafe { ComRef::from_raw(raw) }.unwrap();
    (instance, state)
}

unsafe fn fake<'a>(this: RawPtr) -> &'a FakeDataObject {
    unsafe { &*(this as *const FakeDataObject) }
}

unsafe extern "system" fn fake_query_interface(this: RawPtr, iid: *const Guid, out: *mut RawPtr) -> HResult {
    unsafe {
        if *iid == IID_IUNKNOWN || *iid == IID_IDATAOBJECT {
            fake_add_ref(this);
            *out = this;
            HResult::S_OK
        } else {
            *out = ptr::null_mut();
            HResult::E_NOINTERFACE
        }
    }
}

unsafe extern "system" fn fake_add_ref(this: RawPtr) -> u32 {
    unsafe { fake(this) }.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn fake_release(this: RawPtr) -> u32 {
    let object = unsafe { fake(this) };
    let previous = object.refs.fetch_sub(1, Ordering::SeqCst);
    assert!(previous > 0, "fake data object over-released");
    if previous == 1 {
        object.state.destroyed.store(true, Ordering::SeqCst);
        drop(unsafe { Box::from_raw(this as *mut FakeDataObject) });
    }
    previous - 1
}

unsafe extern "system" fn fake_get_data(this: RawPtr, format: *const FormatEtc, medium: *mut StgMedium) -> HResult {
    let object = unsafe { fake(this) };
    object.state.get_calls.fetch_add(1, Ordering::SeqCst);
    let id = unsafe { (*format).cf_format };
    if !object.state.offers(id) {
        return HResult::DV_E_FORMATETC;
    }
    unsafe {
        fake_add_ref(this);
        medium.write(StgMedium {
            tymed: MediumKind::HGlobal as u32,
            data: fake_payload(id),
            unk_for_release: this,
        });
    }
    HResult::S_OK
}

unsafe extern "system" fn fake_get_data_here(
    _this: RawPtr,
    _format: *const FormatEtc,
    _medium: *mut StgMedium,
) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn fake_query_get_data(this: RawPtr, format: *const FormatEtc) -> HResult {
    let object = unsafe { fake(this) };
    let id = unsafe { (*format).cf_format };
    object.state.queried.lock().push(id);
    if object.state.offers(id) {
        HResult::S_OK
    } else {
        HResult::DV_E_FORMATETC
    }
}

unsafe extern "system" fn fake_get_canonical_format_etc(
    _this: RawPtr,
    _format_in: *const FormatEtc,
    _format_out: *mut FormatEtc,
) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn fake_set_data(
    this: RawPtr,
    format: *const FormatEtc,
    medium: *const StgMedium,
    release: Bool,
) -> HResult {
    let object = unsafe { fake(this) };
    let id = unsafe { (*format).cf_format };
    object.state.set_calls.lock().push((id, release != 0));
    if release != 0 {
        let owner = unsafe { (*medium).unk_for_release };
        if !owner.is_null() {
            unsafe { release_raw(owner) };
        }
    }
    HResult::S_OK
}

unsafe extern "system" fn fake_enum(_this: RawPtr, _direction: u32, _enumerator: *mut RawPtr) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn fake_d_advise(
    _this: RawPtr,
    _format: *const FormatEtc,
    _advf: u32,
    _sink: RawPtr,
    _connection: *mut u32,
) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn fake_d_unadvise(_this: RawPtr, _connection: u32) -> HResult {
    HResult::E_NOTIMPL
}

unsafe extern "system" fn fake_enum_d_advise(_this: RawPtr, _enumerator: *mut RawPtr) -> HResult {
    HResult::E_NOTIMPL
}

// =============================================================================
// IAgileReference
// =============================================================================

/// What a fake agile reference has seen
#[derive(Default)]
pub struct AgileProbe {
    /// Make every further Resolve fail with RPC_E_DISCONNECTED
    pub dead: AtomicBool,
    /// Resolve calls
    pub resolves: AtomicUsize,
    /// Set once the last reference is released
    pub released: AtomicBool,
}

#[repr(C)]
struct FakeAgileReference {
    vtable: &'static IAgileReferenceVtbl,
    refs: AtomicU32,
    target: RawPtr,
    probe: Arc<AgileProbe>,
}

static FAKE_AGILE_VTBL: IAgileReferenceVtbl = IAgileReferenceVtbl {
    base: IUnknownVtbl {
        query_interface: agile_query_interface,
        add_ref: agile_add_ref,
        release: agile_release,
    },
    resolve: agile_resolve,
};

/// An agile reference over `target`, holding its own reference to it.
///
/// # Safety
///
/// `target` must be a live interface pointer.
pub unsafe fn fake_agile_reference(target: RawPtr) -> (RawPtr, Arc<AgileProbe>) {
    unsafe { add_ref_raw(target) };
    let probe = Arc::new(AgileProbe::default());
    let agile = Box::new(FakeAgileReference {
        vtable: &FAKE_AGILE_VTBL,
        refs: AtomicU32::new(1),
        target,
        probe: probe.clone(),
    });
    (Box::into_raw(agile) as RawPtr, probe)
}

unsafe fn agile<'a>(this: RawPtr) -> &'a FakeAgileReference {
    unsafe { &*(this as *const FakeAgileReference) }
}

unsafe extern "system" fn agile_query_interface(_this: RawPtr, _iid: *const Guid, out: *mut RawPtr) -> HResult {
    unsafe { *out = ptr::null_mut() };
    HResult::E_NOINTERFACE
}

unsafe extern "system" fn agile_add_ref(this: RawPtr) -> u32 {
    unsafe { agile(this) }.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn agile_release(this: RawPtr) -> u32 {
    let reference = unsafe { agile(this) };
    let previous = reference.refs.fetch_sub(1, Ordering::SeqCst);
    assert!(previous > 0, "fake agile reference over-released");
    if previous == 1 {
        reference.probe.released.store(true, Ordering::SeqCst);
        unsafe {
            release_raw(reference.target);
            drop(Box::from_raw(this as *mut FakeAgileReference));
        }
    }
    previous - 1
}

unsafe extern "system" fn agile_resolve(this: RawPtr, iid: *const Guid, out: *mut RawPtr) -> HResult {
    let reference = unsafe { agile(this) };
    reference.probe.resolves.fetch_add(1, Ordering::SeqCst);
    if reference.probe.dead.load(Ordering::SeqCst) {
        unsafe { *out = ptr::null_mut() };
        return HResult::RPC_E_DISCONNECTED;
    }
    unsafe {
        let unknown = vtable_of::<IUnknownVtbl>(reference.target);
        (unknown.query_interface)(reference.target, iid, out)
    }
}

// =============================================================================
// Platform
// =============================================================================

/// In-memory OLE clipboard
#[derive(Default)]
pub struct FakePlatform {
    apartments: Mutex<HashMap<ThreadId, ApartmentState>>,
    clipboard: Mutex<usize>,
    busy_remaining: AtomicU32,
    initialize_status: Mutex<Option<HResult>>,
    agile_failure: Mutex<Option<HResult>>,
    agile_probes: Mutex<Vec<Arc<AgileProbe>>>,
    /// OleGetClipboard calls
    pub get_calls: AtomicUsize,
    /// OleSetClipboard calls
    pub set_calls: AtomicUsize,
    /// OleFlushClipboard calls
    pub flush_calls: AtomicUsize,
    /// RoGetAgileReference calls
    pub agile_calls: AtomicUsize,
}

impl FakePlatform {
    /// Platform with the calling thread in an STA
    pub fn new() -> Arc<Self> {
        let platform = Arc::new(Self::default());
        platform.enter(ApartmentState::SingleThreaded);
        platform
    }

    /// Put the calling thread into `state`
    pub fn enter(&self, state: ApartmentState) {
        self.apartments.lock().insert(thread::current().id(), state);
    }

    /// Fail the next `count` OleGetClipboard calls with CLIPBRD_E_CANT_OPEN
    pub fn set_busy(&self, count: u32) {
        self.busy_remaining.store(count, Ordering::SeqCst);
    }

    /// Status OleInitialize returns
    pub fn set_initialize_status(&self, status: HResult) {
        *self.initialize_status.lock() = Some(status);
    }

    /// Status RoGetAgileReference fails with
    pub fn fail_agile(&self, status: HResult) {
        *self.agile_failure.lock() = Some(status);
    }

    /// Probe of the most recently created agile reference
    pub fn last_agile(&self) -> Option<Arc<AgileProbe>> {
        self.agile_probes.lock().last().cloned()
    }

    /// Object currently on the clipboard (borrowed), null if empty
    pub fn clipboard_raw(&self) -> RawPtr {
        *self.clipboard.lock() as RawPtr
    }

    /// Put a foreign object on the clipboard directly, as another process
    /// would.
    pub fn place(&self, object: &ComRef) {
        unsafe { self.replace(object.as_raw()) };
    }

    unsafe fn replace(&self, object: RawPtr) {
        if !object.is_null() {
            unsafe { add_ref_raw(object) };
        }
        let previous = std::mem::replace(&mut *self.clipboard.lock(), object as usize) as RawPtr;
        if !previous.is_null() {
            unsafe { release_raw(previous) };
        }
    }
}

impl OlePlatform for FakePlatform {
    fn initialize(&self) -> HResult {
        let status = self.initialize_status.lock().unwrap_or(HResult::S_OK);
        if status.is_success() {
            self.enter(ApartmentState::SingleThreaded);
        }
        status
    }

    fn apartment_state(&self) -> ApartmentState {
        self.apartments
            .lock()
            .get(&thread::current().id())
            .copied()
            .unwrap_or(ApartmentState::Uninitialized)
    }

    fn get_clipboard(&self, data_object: &mut RawPtr) -> HResult {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let busy = self.busy_remaining.load(Ordering::SeqCst);
        if busy > 0 {
            self.busy_remaining.store(busy - 1, Ordering::SeqCst);
            return HResult::CLIPBRD_E_CANT_OPEN;
        }

        let current = self.clipboard_raw();
        if current.is_null() {
            // An empty clipboard still yields an object, offering nothing.
            let (empty, _) = fake_data_object(&[]);
            *data_object = empty.into_raw();
        } else {
            unsafe { add_ref_raw(current) };
            *data_object = current;
        }
        HResult::S_OK
    }

    unsafe fn set_clipboard(&self, data_object: RawPtr) -> HResult {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        unsafe { self.replace(data_object) };
        HResult::S_OK
    }

    fn flush_clipboard(&self) -> HResult {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        HResult::S_OK
    }

    unsafe fn create_agile_reference(
        &self,
        _options: AgileReferenceOptions,
        _iid: &Guid,
        instance: RawPtr,
        agile: &mut RawPtr,
    ) -> HResult {
        self.agile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.agile_failure.lock() {
            return status;
        }
        let (reference, probe) = unsafe { fake_agile_reference(instance) };
        self.agile_probes.lock().push(probe);
        *agile = reference;
        HResult::S_OK
    }
}

impl Drop for FakePlatform {
    fn drop(&mut self) {
        unsafe { self.replace(ptr::null_mut()) };
    }
}

// =============================================================================
// Local objects and registry
// =============================================================================

/// A local data object that counts its own destruction
pub struct CountedObject {
    /// Format this object offers
    pub format_id: u16,
    drops: Arc<AtomicUsize>,
}

impl CountedObject {
    /// New object offering `format_id`, plus its drop counter
    pub fn new(format_id: u16) -> (Arc<Self>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let object = Arc::new(Self {
            format_id,
            drops: drops.clone(),
        });
        (object, drops)
    }
}

impl DataObject for CountedObject {
    fn get_data(&self, format: &FormatDescriptor) -> Result<TransferMedium> {
        if format.format_id != self.format_id {
            return Err(ole_clipboard_bridge::BridgeError::from_status(
                "GetData",
                HResult::DV_E_FORMATETC,
            ));
        }
        Ok(TransferMedium::new(MediumKind::HGlobal, fake_payload(self.format_id)))
    }

    fn query_get_data(&self, format: &FormatDescriptor) -> Result<Presence> {
        if format.format_id == self.format_id {
            Ok(Presence::Available)
        } else {
            Ok(Presence::Unavailable(HResult::DV_E_FORMATETC))
        }
    }

    fn set_data(&self, _format: &FormatDescriptor, _medium: TransferMedium, _release: bool) -> Result<()> {
        Ok(())
    }
}

impl Drop for CountedObject {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

mock! {
    pub Registry {}

    impl FormatRegistry for Registry {
        fn format_name(&self, id: u16) -> Option<String>;
        fn register_format(&self, name: &str) -> Option<u16>;
        fn canonical_id(&self, id: u16) -> u16;
    }
}
