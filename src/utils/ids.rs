//! Opaque identifiers for messages and conversations.

use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a 128-bit random identifier rendered as lowercase hex.
///
/// If the OS entropy source is unavailable the id is derived from the current
/// time plus a process-wide counter, which is still unique per process.
pub fn new_id() -> String {
    let mut bytes = [0u8; 16];
    if getrandom::fill(&mut bytes).is_err() {
        let nanos = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default() as u64;
        let counter = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        bytes[..8].copy_from_slice(&nanos.to_be_bytes());
        bytes[8..].copy_from_slice(&counter.to_be_bytes());
    }
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
