//! Connection id generation.

use slchat_proto::ConnId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique connection ids.
///
/// Format: node id (3 chars) + counter (6 chars base36) = 9 chars total.
/// Example: "C01AAAAAB". Ids are unique for the lifetime of the process,
/// which is exactly the lifetime of the store they key into.
pub struct ConnIdGenerator {
    node_id: String,
    counter: AtomicU64,
}

impl ConnIdGenerator {
    /// Create a new generator for the given node id.
    pub fn new(node_id: String) -> Self {
        Self {
            node_id,
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next unique connection id.
    pub fn next(&self) -> ConnId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.node_id, base36_encode_6(n))
    }
}

/// Encode a number as a 6-character base36 string.
fn base36_encode_6(mut n: u64) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut result = [b'A'; 6];

    for i in (0..6).rev() {
        result[i] = CHARS[(n % 36) as usize];
        n /= 36;
    }

    String::from_utf8_lossy(&result).into_owned()
}
