//! ClipboardBridge integration tests
//!
//! Drives get/set/flush against the in-memory platform with hand-built
//! foreign objects.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{fake_data_object, fake_payload, ref_count, CountedObject, FakePlatform};
use ole_clipboard_bridge::clipboard::formats::{CF_TEXT, CF_UNICODETEXT};
use ole_clipboard_bridge::clipboard::{
    BridgeError, BridgeOptions, ClipboardBridge, ClipboardContent, ClipboardObject, DataObject,
    ErrorKind, FormatDescriptor, FormatTable, LocalDataObject, LocalDataObjectWrapper, MediumKind,
    Presence, RemoteDataObjectProxy,
};
use ole_clipboard_bridge::com::{Completion, HResult};
use ole_clipboard_bridge::platform::ApartmentState;

fn bridge(platform: &Arc<FakePlatform>) -> ClipboardBridge {
    ClipboardBridge::new(platform.clone(), Arc::new(FormatTable::new()))
}

fn remote(object: ClipboardObject) -> Arc<RemoteDataObjectProxy> {
    match object {
        ClipboardObject::Remote(proxy) => proxy,
        ClipboardObject::Local(_) => panic!("expected a foreign object"),
    }
}

#[test]
fn test_initialize_tolerates_already_initialized() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    assert_eq!(bridge.initialize().unwrap(), Completion::Done);

    platform.set_initialize_status(HResult::S_FALSE);
    let completion = bridge.initialize().unwrap();
    assert!(completion.is_informational());
    assert_eq!(completion.status(), HResult::S_FALSE);

    platform.set_initialize_status(HResult::RPC_E_CHANGED_MODE);
    let err = bridge.initialize().unwrap_err();
    assert_eq!(err.status(), HResult::RPC_E_CHANGED_MODE);
}

#[test]
fn test_wrong_apartment_fails_without_touching_clipboard() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);

    thread::scope(|s| {
        s.spawn(|| {
            platform.enter(ApartmentState::MultiThreaded);
            match bridge.get() {
                Err(BridgeError::ApartmentState { actual }) => {
                    assert_eq!(actual, ApartmentState::MultiThreaded)
                }
                other => panic!("expected apartment error, got {:?}", other),
            }
            assert_eq!(bridge.set(None).unwrap_err().kind(), ErrorKind::Apartment);
            assert!(bridge.flush().unwrap_err().is_fatal());
        });
        s.spawn(|| {
            // Never initialized at all
            let err = bridge.get().unwrap_err();
            assert_eq!(err.status(), HResult::RPC_E_WRONG_THREAD);
        });
    });

    assert_eq!(platform.get_calls.load(Ordering::SeqCst), 0);
    assert_eq!(platform.set_calls.load(Ordering::SeqCst), 0);
    assert_eq!(platform.flush_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_set_local_then_get_returns_same_object() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (object, _drops) = CountedObject::new(CF_UNICODETEXT);
    let local: LocalDataObject = object;

    bridge.set(Some(local.clone().into())).unwrap();

    let installed = platform.clipboard_raw();
    assert!(unsafe { LocalDataObjectWrapper::is_wrapper(installed) });
    // Only the platform holds the wrapper
    assert_eq!(unsafe { ref_count(installed) }, 1);

    let found = bridge.get().unwrap();
    assert!(found.is_local());
    assert!(Arc::ptr_eq(&found.clone().into_local().unwrap(), &local));
    assert_eq!(platform.agile_calls.load(Ordering::SeqCst), 0);
    // get() gave back the clipboard's reference
    assert_eq!(unsafe { ref_count(installed) }, 1);

    let data = found.data_object();
    assert!(data
        .query_get_data(&FormatDescriptor::new(CF_UNICODETEXT))
        .unwrap()
        .is_available());
}

#[test]
fn test_clear_releases_local_object() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (object, drops) = CountedObject::new(CF_TEXT);

    bridge.set(Some(ClipboardContent::Local(object))).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    bridge.set(None).unwrap();
    assert!(platform.clipboard_raw().is_null());
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    // An empty clipboard offers nothing
    let empty = bridge.get().unwrap();
    assert!(!empty.is_local());
    let data = empty.data_object();
    for id in [CF_TEXT, CF_UNICODETEXT] {
        let presence = data.query_get_data(&FormatDescriptor::new(id)).unwrap();
        assert!(!presence.is_available());
    }
}

#[test]
fn test_get_foreign_returns_proxy() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (fake, state) = fake_data_object(&[CF_UNICODETEXT]);
    platform.place(&fake);
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 2);

    let proxy = remote(bridge.get().unwrap());
    assert_eq!(platform.agile_calls.load(Ordering::SeqCst), 1);
    // ours + clipboard + agile reference + proxy home; the clipboard's
    // returned reference was released
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 4);

    let format = FormatDescriptor::new(CF_UNICODETEXT);
    assert_eq!(
        proxy.query_get_data(&format).unwrap(),
        Presence::Available
    );

    let medium = proxy.get_data(&format).unwrap();
    assert_eq!(medium.kind(), Some(MediumKind::HGlobal));
    assert_eq!(medium.payload(), fake_payload(CF_UNICODETEXT));
    assert_eq!(medium.release_owner().unwrap().as_raw(), fake.as_raw());
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 5);
    drop(medium);
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 4);
    assert_eq!(state.get_calls.load(Ordering::SeqCst), 1);

    let probe = platform.last_agile().unwrap();
    drop(proxy);
    assert!(probe.released.load(Ordering::SeqCst));
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 2);
}

#[test]
fn test_busy_clipboard_retry_is_opt_in() {
    let platform = FakePlatform::new();

    platform.set_busy(1);
    let err = bridge(&platform).get().unwrap_err();
    assert_eq!(err.status(), HResult::CLIPBRD_E_CANT_OPEN);
    assert_eq!(platform.get_calls.load(Ordering::SeqCst), 1);

    let retrying = ClipboardBridge::with_options(
        platform.clone(),
        Arc::new(FormatTable::new()),
        BridgeOptions {
            open_retries: 2,
            retry_delay: Duration::from_millis(1),
        },
    );

    platform.set_busy(2);
    assert!(retrying.get().is_ok());
    assert_eq!(platform.get_calls.load(Ordering::SeqCst), 4);

    platform.set_busy(3);
    let err = retrying.get().unwrap_err();
    assert_eq!(err.status(), HResult::CLIPBRD_E_CANT_OPEN);
    assert_eq!(platform.get_calls.load(Ordering::SeqCst), 7);
}

#[test]
fn test_agile_failure_releases_clipboard_reference() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (fake, _state) = fake_data_object(&[CF_TEXT]);
    platform.place(&fake);
    platform.fail_agile(HResult::E_NOINTERFACE);

    let err = bridge.get().unwrap_err();
    assert_eq!(err.status(), HResult::E_NOINTERFACE);
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 2);
}

#[test]
fn test_set_remote_installs_original_object() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (fake, _state) = fake_data_object(&[CF_TEXT]);
    platform.place(&fake);

    let proxy = remote(bridge.get().unwrap());
    bridge.set(None).unwrap();
    assert!(platform.clipboard_raw().is_null());

    bridge.set(Some(ClipboardContent::Remote(proxy.clone()))).unwrap();
    assert_eq!(platform.clipboard_raw(), fake.as_raw());
    // The home pointer was used; nothing new was resolved
    assert_eq!(platform.last_agile().unwrap().resolves.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set_remote_from_another_sta_resolves_for_that_thread() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (fake, _state) = fake_data_object(&[CF_TEXT]);
    platform.place(&fake);
    let proxy = remote(bridge.get().unwrap());
    bridge.set(None).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            platform.enter(ApartmentState::SingleThreaded);
            bridge
                .set(Some(ClipboardContent::Remote(proxy.clone())))
                .unwrap();
        });
    });

    assert_eq!(platform.clipboard_raw(), fake.as_raw());
    assert_eq!(platform.last_agile().unwrap().resolves.load(Ordering::SeqCst), 2);
    // ours + clipboard + agile + home; the call-scoped pointer was released
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 4);
}

#[test]
fn test_proxy_dropped_off_home_thread_is_released_by_pump() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    let (fake, _state) = fake_data_object(&[CF_TEXT]);
    platform.place(&fake);

    let proxy = remote(bridge.get().unwrap());
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 4);

    thread::spawn(move || drop(proxy)).join().unwrap();

    // The agile reference went away with the proxy; the home pointer waits
    assert_eq!(bridge.pending_releases(), 1);
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 3);

    assert_eq!(bridge.pump_releases().unwrap(), 1);
    assert_eq!(bridge.pending_releases(), 0);
    assert_eq!(unsafe { ref_count(fake.as_raw()) }, 2);
}

#[test]
fn test_unsupported_content_is_not_implemented() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);

    let err = bridge
        .set(Some(ClipboardContent::Unsupported(Box::new(42u32))))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert_eq!(err.status(), HResult::E_NOTIMPL);
    assert_eq!(platform.set_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_flush_forwards_to_platform() {
    let platform = FakePlatform::new();
    let bridge = bridge(&platform);
    assert_eq!(bridge.flush().unwrap(), Completion::Done);
    assert_eq!(platform.flush_calls.load(Ordering::SeqCst), 1);
}
