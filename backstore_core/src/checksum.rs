//! Content digests.
//!
//! Two digests live here and they are not interchangeable. [`block_checksum`]
//! is what block integrity checks compare against and is stored next to every
//! compressed block; [`file_checksum`] identifies whole files such as
//! manifests. Existing stores hold both formats, so neither can change.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};

/// Number of hex characters kept from the block digest.
pub const PRESERVED_CHECKSUM_LENGTH: usize = 64;

/// SHA-512 of `data`, lowercase hex, truncated to
/// [`PRESERVED_CHECKSUM_LENGTH`] characters.
pub fn block_checksum(data: &[u8]) -> String {
    let mut checksum = hex::encode(Sha512::digest(data));
    checksum.truncate(PRESERVED_CHECKSUM_LENGTH);
    checksum
}

/// Full SHA-256 of the file at `path`, lowercase hex. The file is streamed,
/// not loaded into memory.
pub fn file_checksum(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn is_lower_hex(s: &str) -> bool {
        s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    #[test]
    fn block_checksum_of_empty_input() {
        // First half of the SHA-512 of the empty string.
        assert_eq!(
            block_checksum(b""),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce"
        );
    }

    #[test]
    fn block_checksum_known_vector() {
        assert_eq!(
            block_checksum(b"abc"),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a"
        );
    }

    #[test]
    fn file_checksum_known_vector() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();
        assert_eq!(
            file_checksum(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_and_block_checksums_differ() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();
        assert_ne!(file_checksum(file.path()).unwrap(), block_checksum(b"abc"));
    }

    #[test]
    fn file_checksum_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_checksum(dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    proptest! {
        #[test]
        fn prop_block_checksum_shape(data in prop::collection::vec(any::<u8>(), 0..4096)) {
            let sum = block_checksum(&data);
            prop_assert_eq!(sum.len(), PRESERVED_CHECKSUM_LENGTH);
            prop_assert!(is_lower_hex(&sum));
        }
    }
}
