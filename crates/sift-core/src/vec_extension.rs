//! Makes the vec0 module available on every connection this process opens.
//!
//! `sqlite3_auto_extension` mutates process-global state and re-registration
//! is undefined behavior on some sqlite-vec builds, so the attempt runs once
//! and its outcome is cached for the lifetime of the process. A failed or
//! disabled registration is not an error up here: the v2 migration creates a
//! plain `items_vec` table when the module is absent and vector search then
//! scans the stored blobs in-process, so this module logs the reason itself
//! and hands the store a plain availability hint.

use std::os::raw::{c_char, c_int};
use std::sync::OnceLock;

use tracing::{debug, warn};

/// Set to `0`, `false`, or `off` to skip registration. The main use is
/// exercising the plain-table fallback paths against a stock SQLite build.
/// Consulted once; later changes to the variable have no effect.
pub const VEC_OPT_OUT_ENV: &str = "SIFT_SQLITE_VEC_AUTO";

static VEC_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Ensure vec0 rides along on connections opened after this call.
///
/// Returns whether the module is expected to be available. Safe to call on
/// every [`crate::Store::open`]; only the first call in the process does any
/// work, and every call reports the cached first outcome.
pub fn ensure_registered() -> bool {
    *VEC_AVAILABLE.get_or_init(|| {
        if opted_out() {
            debug!(
                "sqlite-vec registration disabled by {VEC_OPT_OUT_ENV}, \
                 vector search will use the plain-table fallback"
            );
            return false;
        }

        match register() {
            Ok(()) => true,
            Err(rc) => {
                warn!(
                    "sqlite-vec auto-extension registration failed (rc={rc}), \
                     vector search will scan stored blobs in-process"
                );
                false
            }
        }
    })
}

fn opted_out() -> bool {
    matches!(
        std::env::var(VEC_OPT_OUT_ENV).ok().as_deref(),
        Some("0" | "false" | "off")
    )
}

/// Entry-point signature `sqlite3_auto_extension` expects.
type EntryPoint = unsafe extern "C" fn(
    *mut rusqlite::ffi::sqlite3,
    *mut *mut c_char,
    *const rusqlite::ffi::sqlite3_api_routines,
) -> c_int;

fn register() -> Result<(), c_int> {
    // sqlite-vec declares its init function against its own bindgen types,
    // which don't unify with rusqlite's ffi declarations, so the cast has to
    // go through a transmute of the function pointer.
    let init: EntryPoint =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(init)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(rc)
    }
}
