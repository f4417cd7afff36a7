use sha2::{Digest, Sha256};

/// Hash over the ordered pair (a, b). The length prefix keeps the pair
/// boundary unambiguous, so moving bytes between the two parts always
/// changes the digest.
pub fn sha256_pair_hex(a: &[u8], b: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((a.len() as u64).to_be_bytes());
    hasher.update(a);
    hasher.update(b);
    hex::encode(hasher.finalize())
}
