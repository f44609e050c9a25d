/*
 * lib.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Filodiretto, a raw-socket HTTP/1.1 fallback client.
 *
 * Filodiretto is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Filodiretto is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Filodiretto.  If not, see <http://www.gnu.org/licenses/>.
 */

//! C FFI for filodiretto core. Requests are identified by an opaque task
//! id returned from filodiretto_request; cancel with filodiretto_cancel.
//! All string parameters are UTF-8 NUL-terminated. Strings handed to the
//! completion callback are valid only for the duration of the call.

use libc::{c_char, c_int, c_void, size_t};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use filodiretto_core::{Canceller, HttpClient, HttpUrl, Method, RequestTemplate};

/// Wrapper so *mut c_void can be moved into Send closures. C callbacks are
/// invoked from worker threads; UI must marshal to its main thread.
struct SendableUserData(*mut c_void);
unsafe impl Send for SendableUserData {}
unsafe impl Sync for SendableUserData {}

/// Completion callback: exactly one invocation per submitted request.
/// On success: status > 0, headers as "Name: value" lines joined by "\n",
/// body pointer + length, error NULL. On failure (including cancellation):
/// status 0, headers NULL, body NULL/0, error message set.
type OnRequestComplete = extern "C" fn(
    c_int,
    *const c_char,
    *const u8,
    size_t,
    *const c_char,
    *mut c_void,
);

/// Registry of in-flight requests keyed by task id. Hosts the shared tokio
/// runtime and the one client (cookie store and worker pool are global to
/// the process).
struct Registry {
    runtime: tokio::runtime::Runtime,
    client: HttpClient,
    tasks: RwLock<HashMap<u64, Canceller>>,
    task_counter: AtomicU64,
}

fn registry() -> &'static Registry {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_init(|| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("failed to create tokio runtime");
        Registry {
            runtime,
            client: HttpClient::new(),
            tasks: RwLock::new(HashMap::new()),
            task_counter: AtomicU64::new(0),
        }
    })
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

fn parse_method(s: &str) -> Option<Method> {
    match s.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::Get),
        "POST" => Some(Method::Post),
        "PUT" => Some(Method::Put),
        "DELETE" => Some(Method::Delete),
        "HEAD" => Some(Method::Head),
        "OPTIONS" => Some(Method::Options),
        "PATCH" => Some(Method::Patch),
        "TRACE" => Some(Method::Trace),
        _ => None,
    }
}

/// Header block: one "Name: value" per line ('\n' or "\r\n" separated).
fn parse_headers(block: &str, mut template: RequestTemplate) -> RequestTemplate {
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            template = template.header(name.trim(), value.trim());
        }
    }
    template
}

fn c_string(s: &str) -> CString {
    CString::new(s).unwrap_or_else(|_| CString::new("").unwrap())
}

/// Submit a request. method: one of the standard HTTP verbs ("GET",
/// "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "TRACE",
/// case-insensitive); nonstandard methods are not exposed through the C
/// surface. headers: optional header block (may be NULL). body: optional
/// body bytes (may be NULL, body_len ignored then). Returns a non-zero
/// task id, or 0 if the arguments are unusable (NULL/unrecognized method
/// or invalid URL) in which case the callback is never invoked.
#[no_mangle]
pub extern "C" fn filodiretto_request(
    method: *const c_char,
    url: *const c_char,
    headers: *const c_char,
    body: *const u8,
    body_len: size_t,
    on_complete: OnRequestComplete,
    user_data: *mut c_void,
) -> u64 {
    let Some(method) = ptr_to_str(method).and_then(|s| parse_method(&s)) else {
        return 0;
    };
    let Some(url) = ptr_to_str(url).and_then(|s| HttpUrl::parse(&s).ok()) else {
        return 0;
    };

    let mut template = RequestTemplate::new(method, url);
    if let Some(block) = ptr_to_str(headers) {
        template = parse_headers(&block, template);
    }
    if !body.is_null() && body_len > 0 {
        let bytes = unsafe { std::slice::from_raw_parts(body, body_len) };
        template = template.body(bytes.to_vec());
    }

    let reg = registry();
    let id = reg.task_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let task = {
        let _guard = reg.runtime.enter();
        reg.client.submit(template)
    };
    if let Ok(mut tasks) = reg.tasks.write() {
        tasks.insert(id, task.canceller());
    }

    let user_data = SendableUserData(user_data);
    reg.runtime.spawn(async move {
        // Capture the whole SendableUserData wrapper (not just its pointer
        // field) so the future is Send under 2021 disjoint-capture rules.
        let user_data = user_data;
        let result = task.result().await;
        if let Ok(mut tasks) = registry().tasks.write() {
            tasks.remove(&id);
        }
        match result {
            Ok(response) => {
                let headers = response
                    .head
                    .headers()
                    .map(|(n, v)| format!("{}: {}", n, v))
                    .collect::<Vec<_>>()
                    .join("\n");
                let headers_c = c_string(&headers);
                on_complete(
                    response.status() as c_int,
                    headers_c.as_ptr(),
                    response.body.as_ptr(),
                    response.body.len(),
                    ptr::null(),
                    user_data.0,
                );
            }
            Err(err) => {
                let error_c = c_string(&err.to_string());
                on_complete(0, ptr::null(), ptr::null(), 0, error_c.as_ptr(), user_data.0);
            }
        }
    });
    id
}

/// Cancel an in-flight request. Returns 1 if the id was known (the
/// callback will still fire exactly once, with a cancellation error unless
/// the natural outcome won the race), 0 if unknown or already completed.
#[no_mangle]
pub extern "C" fn filodiretto_cancel(task_id: u64) -> c_int {
    let reg = registry();
    let canceller = match reg.tasks.read() {
        Ok(tasks) => tasks.get(&task_id).cloned(),
        Err(_) => None,
    };
    match canceller {
        Some(canceller) => {
            canceller.cancel();
            1
        }
        None => 0,
    }
}

/// Number of requests currently in flight.
#[no_mangle]
pub extern "C" fn filodiretto_active_count() -> size_t {
    registry().tasks.read().map(|t| t.len()).unwrap_or(0)
}
