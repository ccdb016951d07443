use sha2::{Digest, Sha256};

/// 16-byte OpenTelemetry trace ID.
pub type TraceId = [u8; 16];

/// Derive the trace ID shared by every record of one run attempt.
///
/// The first 16 bytes of SHA-256 over the big-endian run ID followed by the big-endian
/// attempt number. Stable across processes and webhook redeliveries.
pub fn derive_trace_id(run_id: u64, run_attempt: u32) -> TraceId {
    let mut hasher = Sha256::new();
    hasher.update(run_id.to_be_bytes());
    hasher.update(run_attempt.to_be_bytes());
    let digest = hasher.finalize();
    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);
    id
}
