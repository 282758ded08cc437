//! The server's write verifier (§3, §8 invariant 7).
//!
//! A 64-bit value fixed at process start and returned unchanged on every
//! `WRITE`/`COMMIT` reply for the life of the process, so clients can
//! detect a server restart (and thus the possible loss of unstably-written
//! data) by comparing verifiers across calls. Regenerated from the current
//! time on every start - intentionally, not persisted - which is the
//! mechanism by which clients notice restarts at all (§6 "Persisted state").

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::xdr::nfs3::writeverf3;

/// Derives a write verifier from wall-clock time at server start.
/// Nanosecond resolution makes two verifiers generated more than roughly a
/// microsecond apart (§8 invariant 7 only requires >1ms) differ with
/// overwhelming probability, while staying a pure function of time rather
/// than needing process-global random state.
pub fn generate() -> writeverf3 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let nanos = now.as_nanos() as u64;
    nanos.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differs_across_calls_more_than_a_millisecond_apart() {
        let a = generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate();
        assert_ne!(a, b);
    }
}
