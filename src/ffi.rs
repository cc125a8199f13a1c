//! FFI bindings for Synheart Wellbeing
//!
//! This module provides C-compatible functions for driving the engine from
//! mobile hosts. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `wb_free_string`.
//!
//! The engine behind a handle uses in-memory collaborators; the host feeds
//! raw health records with `wb_engine_ingest_health`.

use serde::Serialize;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::InMemoryHealthSource;
use crate::config::Config;
use crate::encoder::AnalysisEncoder;
use crate::error::WellbeingError;
use crate::pipeline::{EngineBuilder, WellbeingEngine};
use crate::schema::{parse_ndjson, CheckInSubmission, HealthRecord};
use crate::types::{Caller, CallerRole};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Record an engine error as `[CODE] message`
fn set_engine_error(err: &WellbeingError) {
    set_last_error(&format!("[{}] {}", err.code(), err));
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Like `cstr_to_string`, recording an error naming `what` on failure
unsafe fn required_arg(ptr: *const c_char, what: &str) -> Option<String> {
    let value = cstr_to_string(ptr);
    if value.is_none() {
        set_last_error(&format!("Invalid {what} string pointer"));
    }
    value
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Opaque handle to a WellbeingEngine
pub struct WellbeingEngineHandle {
    engine: WellbeingEngine,
    health: Arc<InMemoryHealthSource>,
    encoder: AnalysisEncoder,
}

/// Create a new engine from a TOML configuration.
///
/// # Safety
/// - `config_toml` must be a valid null-terminated C string, or NULL for defaults.
/// - Returns a pointer to a newly allocated engine that must be freed with
///   `wb_engine_free`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_new(config_toml: *const c_char) -> *mut WellbeingEngineHandle {
    clear_last_error();

    let config = if config_toml.is_null() {
        Config::default()
    } else {
        let Some(toml) = required_arg(config_toml, "config") else {
            return ptr::null_mut();
        };
        match Config::from_toml_str(&toml) {
            Ok(config) => config,
            Err(e) => {
                set_engine_error(&e);
                return ptr::null_mut();
            }
        }
    };

    let health = Arc::new(InMemoryHealthSource::new());
    let engine = match EngineBuilder::from_config(&config)
        .health_source(health.clone())
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            set_engine_error(&e);
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(WellbeingEngineHandle {
        engine,
        health,
        encoder: AnalysisEncoder::new(),
    }))
}

/// Free an engine.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_free(handle: *mut WellbeingEngineHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// Engine Operations
// ============================================================================

/// Feed newline-delimited health records for a user.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `user_id` and `ndjson` must be valid null-terminated C strings.
/// - Returns the number of records ingested, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_ingest_health(
    handle: *mut WellbeingEngineHandle,
    user_id: *const c_char,
    ndjson: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &*handle;

    let Some(user) = required_arg(user_id, "user_id") else {
        return -1;
    };
    let Some(ndjson) = required_arg(ndjson, "NDJSON") else {
        return -1;
    };

    let records: Vec<HealthRecord> = match parse_ndjson(&ndjson) {
        Ok(records) => records,
        Err(e) => {
            set_engine_error(&e.into());
            return -1;
        }
    };
    if let Some(err) = records.iter().find_map(|r| r.validate().err()) {
        set_engine_error(&err.into());
        return -1;
    }

    let count = records.len();
    match handle.health.insert(&user, records) {
        Ok(()) => i32::try_from(count).unwrap_or(i32::MAX),
        Err(e) => {
            set_engine_error(&e);
            -1
        }
    }
}

/// Analyze a user's recent window and return the analysis envelope JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `user_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `wb_free_string`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_analyze(
    handle: *mut WellbeingEngineHandle,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let Some(user) = required_arg(user_id, "user_id") else {
        return ptr::null_mut();
    };

    match handle.engine.analyze_recent(&user) {
        Ok(result) => json_to_cstr(&handle.encoder.encode(&result)),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Submit a check-in (JSON object) and return the stored check-in JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `user_id` and `json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `wb_free_string`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_submit_check_in(
    handle: *mut WellbeingEngineHandle,
    user_id: *const c_char,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let Some(user) = required_arg(user_id, "user_id") else {
        return ptr::null_mut();
    };
    let Some(json) = required_arg(json, "JSON") else {
        return ptr::null_mut();
    };

    let submission: CheckInSubmission = match serde_json::from_str(&json) {
        Ok(submission) => submission,
        Err(e) => {
            set_engine_error(&e.into());
            return ptr::null_mut();
        }
    };

    match handle.engine.submit_check_in(&user, submission) {
        Ok(check_in) => json_to_cstr(&check_in),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Return `{"can_check_in": bool, "next_check_in_time": ...}` for a user.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `user_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `wb_free_string`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_check_in_status(
    handle: *mut WellbeingEngineHandle,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let Some(user) = required_arg(user_id, "user_id") else {
        return ptr::null_mut();
    };

    match handle.engine.get_check_in_status(&user) {
        Ok(status) => json_to_cstr(&status),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Clear a user's check-in cooldown on behalf of a caller.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `caller_id`, `caller_role` ("member" or "support") and `user_id` must be
///   valid null-terminated C strings.
/// - Returns 0 on success, -1 on error (including a non-support caller).
#[no_mangle]
pub unsafe extern "C" fn wb_engine_reset_check_in_timer(
    handle: *mut WellbeingEngineHandle,
    caller_id: *const c_char,
    caller_role: *const c_char,
    user_id: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }
    let handle = &*handle;

    let Some(caller_id) = required_arg(caller_id, "caller_id") else {
        return -1;
    };
    let Some(role) = required_arg(caller_role, "caller_role") else {
        return -1;
    };
    let Some(user) = required_arg(user_id, "user_id") else {
        return -1;
    };

    let role = match role.as_str() {
        "support" => CallerRole::Support,
        "member" => CallerRole::Member,
        other => {
            set_last_error(&format!("Unknown caller role: {other}"));
            return -1;
        }
    };
    let caller = Caller {
        user_id: caller_id,
        role,
    };

    match handle.engine.reset_check_in_timer(&caller, &user) {
        Ok(()) => 0,
        Err(e) => {
            set_engine_error(&e);
            -1
        }
    }
}

/// List open support requests as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - Returns a newly allocated string that must be freed with `wb_free_string`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_open_support_requests(
    handle: *mut WellbeingEngineHandle,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    match handle.engine.list_open_support_requests() {
        Ok(requests) => json_to_cstr(&requests),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Claim a support request and return the claimed request JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `wb_engine_new`.
/// - `request_id` (UUID) and `buddy_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `wb_free_string`.
/// - Returns NULL on error; call `wb_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wb_engine_claim_support_request(
    handle: *mut WellbeingEngineHandle,
    request_id: *const c_char,
    buddy_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    let Some(request_id) = required_arg(request_id, "request_id") else {
        return ptr::null_mut();
    };
    let Some(buddy) = required_arg(buddy_id, "buddy_id") else {
        return ptr::null_mut();
    };

    let id = match Uuid::parse_str(&request_id) {
        Ok(id) => id,
        Err(e) => {
            set_last_error(&format!("Invalid request_id: {e}"));
            return ptr::null_mut();
        }
    };

    match handle.engine.claim_support_request(id, &buddy) {
        Ok(request) => json_to_cstr(&request),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by wellbeing functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a wellbeing function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wb_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next wellbeing function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn wb_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn wb_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
