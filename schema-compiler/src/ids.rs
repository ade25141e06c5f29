// Type id derivation.

use md5::{Digest, Md5};

const ID_HIGH_BIT: u64 = 1 << 63;

/// Every schema id has the high bit set; anything else was not generated by
/// the id tool and is rejected.
pub fn is_valid_id(id: u64) -> bool {
    id & ID_HIGH_BIT != 0
}

/// Id of a declaration that does not carry an explicit `@0x...`, derived
/// from its parent's id and its own name.
pub fn generate_child_id(parent_id: u64, child_name: &str) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(parent_id.to_le_bytes());
    hasher.update(child_name.as_bytes());
    fold_digest(&hasher.finalize())
}

/// Stand-in id for a file that forgot to declare one. Derived from the file
/// content so that repeated compiles of the same text agree.
pub fn generate_file_id(source: &str) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(source.as_bytes());
    fold_digest(&hasher.finalize())
}

fn fold_digest(digest: &[u8]) -> u64 {
    let id = digest
        .iter()
        .take(8)
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
    id | ID_HIGH_BIT
}
