//! Hashing utilities for ringfs
//!
//! - BLAKE3 truncated to 64 bits for positions on the hash ring
//! - Virtual-node labels so one address maps to many positions

/// Position of a key on the hash circle
pub fn ring_position(key: &str) -> u64 {
    hash_u64(key.as_bytes())
}

/// Position of the `index`-th virtual node of `addr`
pub fn vnode_position(addr: &str, index: usize) -> u64 {
    let label = format!("{}#{}", addr, index);
    hash_u64(label.as_bytes())
}

fn hash_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(prefix)
}
