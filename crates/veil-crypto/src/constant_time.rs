//! Constant-time comparisons for secret-dependent data.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Execution time depends only on slice length, not content.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Timing-safe 32-byte array comparison. Used for fragment MAC tags.
#[must_use]
#[inline(never)]
pub fn verify_32(a: &[u8; 32], b: &[u8; 32]) -> bool {
    ct_eq(a, b)
}
