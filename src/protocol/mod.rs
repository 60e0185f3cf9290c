/// Wire protocol codecs
///
/// This module holds the byte-level encoding shared by both display protocols
/// and the per-protocol message definitions. Nothing in here touches a socket,
/// so every layout can be checked in isolation.

pub mod wire;
pub mod x11;
pub mod wayland;

pub use wire::*;

/// Padding helper - both protocols pad data to 4-byte boundaries
pub fn pad(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// Calculate padded length
pub fn padded_len(n: usize) -> usize {
    n + pad(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding() {
        assert_eq!(pad(0), 0);
        assert_eq!(pad(1), 3);
        assert_eq!(pad(4), 0);
        assert_eq!(pad(6), 2);
        assert_eq!(padded_len(13), 16);
        assert_eq!(padded_len(16), 16);
    }
}
