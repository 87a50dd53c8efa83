//! Identifier validation boundary.
//!
//! Identifiers travel as unsigned 64-bit integers, but the presentation side
//! stores them as signed 64-bit values. Anything above `i64::MAX` would wrap
//! negative there, so it is rejected here and replaced by [`INVALID_ID`].

/// Sentinel for "no identifier". The server never allocates 0.
pub const INVALID_ID: u64 = 0;

/// Largest identifier that survives a signed 64-bit round trip.
pub const MAX_VALID_ID: u64 = i64::MAX as u64;

/// Returns `raw` if it fits the signed 63-bit range, otherwise [`INVALID_ID`].
pub fn sanitize_id(raw: u64) -> u64 {
    if raw > MAX_VALID_ID {
        tracing::warn!(raw, "identifier exceeds signed 63-bit range, treating as absent");
        INVALID_ID
    } else {
        raw
    }
}

/// Like [`sanitize_id`] but maps the sentinel to `None`.
pub fn checked_id(raw: u64) -> Option<u64> {
    match sanitize_id(raw) {
        INVALID_ID => None,
        id => Some(id),
    }
}
