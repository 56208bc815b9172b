//! Per-thread last-error slot.

use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::fmt::Display;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Replace the calling thread's last error with `err`.
pub(crate) fn set_last_error(err: impl Display) {
    let message = err.to_string().replace('\0', "\\0");
    tracing::debug!("C API call failed: {}", message);
    let message = CString::new(message).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Pointer to the last error message, or to an empty string. The pointer
/// stays valid until the next failing call on the same thread.
pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => message.as_ptr(),
        None => c"".as_ptr(),
    })
}

/// Run `f`, storing its error in the last-error slot.
pub(crate) fn capture<T, E: Display>(f: impl FnOnce() -> Result<T, E>) -> Option<T> {
    match f() {
        Ok(value) => Some(value),
        Err(err) => {
            set_last_error(err);
            None
        }
    }
}
