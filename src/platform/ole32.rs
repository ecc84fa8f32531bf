//! ole32 / user32 implementation of the platform contracts.

#![allow(non_snake_case)]

use std::ffi::c_void;
use std::ptr;

use super::{AgileReferenceOptions, ApartmentState, OlePlatform};
use crate::clipboard::formats::{standard_format_id, standard_format_name, FormatRegistry};
use crate::com::{Guid, HResult, RawPtr};

const APTTYPE_STA: i32 = 0;
const APTTYPE_MTA: i32 = 1;
const APTTYPE_NA: i32 = 2;
const APTTYPE_MAINSTA: i32 = 3;

/// Longest registered clipboard format name
const MAX_FORMAT_NAME: usize = 256;

#[link(name = "ole32")]
extern "system" {
    fn OleInitialize(reserved: *mut c_void) -> HResult;
    fn OleGetClipboard(data_object: *mut RawPtr) -> HResult;
    fn OleSetClipboard(data_object: RawPtr) -> HResult;
    fn OleFlushClipboard() -> HResult;
    fn CoGetApartmentType(apt_type: *mut i32, qualifier: *mut i32) -> HResult;
    // Windows 8.1+. Older systems would need the Global Interface Table.
    fn RoGetAgileReference(options: u32, riid: *const Guid, unk: RawPtr, agile: *mut RawPtr) -> HResult;
}

#[link(name = "user32")]
extern "system" {
    fn RegisterClipboardFormatW(name: *const u16) -> u32;
    fn GetClipboardFormatNameW(format: u32, name: *mut u16, max: i32) -> i32;
}

/// The real OLE clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ole32Platform;

impl OlePlatform for Ole32Platform {
    fn initialize(&self) -> HResult {
        // SAFETY: reserved must be null.
        unsafe { OleInitialize(ptr::null_mut()) }
    }

    fn apartment_state(&self) -> ApartmentState {
        let mut apt_type = 0;
        let mut qualifier = 0;
        // SAFETY: both out-params point to locals.
        let status = unsafe { CoGetApartmentType(&mut apt_type, &mut qualifier) };
        if status.is_failure() {
            return ApartmentState::Uninitialized;
        }
        match apt_type {
            APTTYPE_STA | APTTYPE_MAINSTA => ApartmentState::SingleThreaded,
            APTTYPE_MTA => ApartmentState::MultiThreaded,
            APTTYPE_NA => ApartmentState::Neutral,
            _ => ApartmentState::Uninitialized,
        }
    }

    fn get_clipboard(&self, data_object: &mut RawPtr) -> HResult {
        // SAFETY: out-param points to caller storage.
        unsafe { OleGetClipboard(data_object) }
    }

    unsafe fn set_clipboard(&self, data_object: RawPtr) -> HResult {
        // SAFETY: guaranteed by caller.
        unsafe { OleSetClipboard(data_object) }
    }

    fn flush_clipboard(&self) -> HResult {
        // SAFETY: no arguments.
        unsafe { OleFlushClipboard() }
    }

    unsafe fn create_agile_reference(
        &self,
        options: AgileReferenceOptions,
        iid: &Guid,
        instance: RawPtr,
        agile: &mut RawPtr,
    ) -> HResult {
        // SAFETY: guaranteed by caller.
        unsafe { RoGetAgileReference(options as u32, iid, instance, agile) }
    }
}

/// Format registry backed by `RegisterClipboardFormatW`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32FormatRegistry;

impl FormatRegistry for Win32FormatRegistry {
    fn format_name(&self, id: u16) -> Option<String> {
        if let Some(name) = standard_format_name(id) {
            return Some(name.to_string());
        }
        let mut buf = [0u16; MAX_FORMAT_NAME];
        // SAFETY: buffer length passed alongside the buffer.
        let len = unsafe { GetClipboardFormatNameW(id as u32, buf.as_mut_ptr(), buf.len() as i32) };
        if len <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buf[..len as usize]))
    }

    fn register_format(&self, name: &str) -> Option<u16> {
        if let Some(id) = standard_format_id(name) {
            return Some(id);
        }
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: `wide` is NUL-terminated.
        let id = unsafe { RegisterClipboardFormatW(wide.as_ptr()) };
        u16::try_from(id).ok().filter(|id| *id != 0)
    }
}
