//! C interface to Skiff.
//!
//! Every object crosses the boundary as an opaque pointer created by a
//! `*_new`/`*_open`/`*_create` function and released by the matching
//! `*_free`. Fallible calls return [`SKIFF_OK`] or [`SKIFF_ERROR`], or null
//! for constructors; the reason is then available from
//! [`skiff_get_last_error`] on the same thread.

use std::ffi::{CStr, c_char, c_int};
use std::sync::Once;

use tracing_subscriber::EnvFilter;

mod catalog;
mod context;
mod error;

pub use catalog::*;
pub use context::*;

pub const SKIFF_OK: c_int = 0;
pub const SKIFF_ERROR: c_int = -1;

/// Env var holding the log filter, in `EnvFilter` syntax.
pub const LOG_ENV: &str = "SKIFF_LOG";

static LOGGING: Once = Once::new();

/// Install a stderr log subscriber once per process when `SKIFF_LOG` is set.
pub(crate) fn init_logging() {
    LOGGING.call_once(|| {
        let Ok(filter) = std::env::var(LOG_ENV) else {
            return;
        };
        // Fails only when the host application installed its own subscriber
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .try_init();
    });
}

/// Borrow a NUL-terminated UTF-8 argument.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("Invalid argument: {} is null", what));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| format!("Invalid argument: {} is not valid UTF-8", what))
}

/// Status code for a call that stored its error, if any.
pub(crate) fn status(ok: Option<()>) -> c_int {
    match ok {
        Some(()) => SKIFF_OK,
        None => SKIFF_ERROR,
    }
}

/// Get the last error raised on this thread, or an empty string.
///
/// The returned pointer is owned by the library and stays valid until the
/// next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn skiff_get_last_error() -> *const c_char {
    error::last_error_ptr()
}

/// Reset the last error of this thread.
#[unsafe(no_mangle)]
pub extern "C" fn skiff_clear_last_error() {
    error::clear_last_error();
}
