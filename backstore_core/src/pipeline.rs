use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::checksum::block_checksum;
use crate::codec::{BlockStream, Codec, NONE_METHOD};
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Checksummed compression front end over a [`Registry`].
///
/// # Write path
/// [`compress_data`] turns a block into a rewindable stream ready to upload.
/// The checksum is taken by the caller over the *original* bytes with
/// [`block_checksum`] and stored alongside the block.
///
/// # Read path
/// [`decompress_and_verify`] decodes the whole block into memory, checks it
/// against the stored checksum and only then hands the bytes back. Nothing
/// unverified ever reaches the caller.
///
/// [`compress_data`]: Pipeline::compress_data
/// [`decompress_and_verify`]: Pipeline::decompress_and_verify
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'r> {
    registry: &'r Registry,
}

impl<'r> Pipeline<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Compress `data` with `method`.
    ///
    /// `"none"` borrows `data` as-is. Any other name must resolve in the
    /// registry, otherwise [`Error::UnsupportedMethod`] is returned before any
    /// work is done.
    pub fn compress_data<'a>(&self, method: &str, data: &'a [u8]) -> Result<BlockStream<'a>> {
        if method == NONE_METHOD {
            return Ok(Cursor::new(Cow::Borrowed(data)));
        }

        let codec = self.resolve(method)?;
        let compressed = codec.compress(data).map_err(|source| Error::Compress {
            method: method.to_string(),
            source,
        })?;
        Ok(Cursor::new(Cow::Owned(compressed)))
    }

    /// Fully decode `src` with `method` without checking its content.
    pub fn decompress_data(&self, method: &str, src: &mut dyn Read) -> Result<Vec<u8>> {
        let decoded = match self.resolve_for_read(method)? {
            Some(codec) => codec.decompress(src),
            None => {
                let mut block = Vec::new();
                src.read_to_end(&mut block).map(|_| block)
            }
        };
        decoded.map_err(|source| Error::Decode {
            method: method.to_string(),
            source,
        })
    }

    /// Decode `src` with `method` and check the result against `checksum`.
    ///
    /// Returns [`Error::Decode`] when the stream itself is unreadable and
    /// [`Error::IntegrityMismatch`] when it decodes to the wrong content.
    pub fn decompress_and_verify(
        &self,
        method: &str,
        mut src: impl Read,
        checksum: &str,
    ) -> Result<Cursor<Vec<u8>>> {
        let block = self.decompress_data(method, &mut src)?;

        let actual = block_checksum(&block);
        if actual != checksum {
            return Err(Error::IntegrityMismatch {
                expected: checksum.to_string(),
                actual,
            });
        }
        Ok(Cursor::new(block))
    }

    fn resolve(&self, method: &str) -> Result<Arc<dyn Codec>> {
        self.registry
            .lookup(method)
            .ok_or_else(|| Error::UnsupportedMethod(method.to_string()))
    }

    /// `None` means the identity transform.
    fn resolve_for_read(&self, method: &str) -> Result<Option<Arc<dyn Codec>>> {
        if method == NONE_METHOD {
            return Ok(None);
        }
        self.resolve(method).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Seek, SeekFrom};

    /// Reverses bytes; enough to prove the pipeline calls through the codec.
    struct Reverse;

    impl Codec for Reverse {
        fn name(&self) -> &'static str {
            "reverse"
        }

        fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }

        fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>> {
            let mut out = Vec::new();
            src.read_to_end(&mut out)?;
            out.reverse();
            Ok(out)
        }
    }

    struct Broken;

    impl Codec for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn compress(&self, _data: &[u8]) -> io::Result<Vec<u8>> {
            Err(io::Error::other("encoder exploded"))
        }

        fn decompress(&self, _src: &mut dyn Read) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame"))
        }
    }

    /// Fails the test if anything reads from it.
    struct Untouchable;

    impl Read for Untouchable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("source must not be read");
        }
    }

    fn registry() -> Registry {
        Registry::builder().register(Reverse).register(Broken).build()
    }

    #[test]
    fn none_borrows_input() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);
        let data = b"verbatim".to_vec();
        let stream = pipeline.compress_data("none", &data).unwrap();
        assert!(matches!(stream.get_ref(), Cow::Borrowed(_)));
        assert_eq!(stream.get_ref().as_ref(), data.as_slice());
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn compressed_stream_can_be_reread() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);
        let mut stream = pipeline.compress_data("reverse", b"abc").unwrap();

        let mut first = Vec::new();
        stream.read_to_end(&mut first).unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut second = Vec::new();
        stream.read_to_end(&mut second).unwrap();

        assert_eq!(first, b"cba");
        assert_eq!(first, second);
    }

    #[test]
    fn roundtrip_through_custom_codec() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);
        let data = b"hello block";
        let stream = pipeline.compress_data("reverse", data).unwrap();
        let mut verified = pipeline
            .decompress_and_verify("reverse", stream, &block_checksum(data))
            .unwrap();
        let mut out = Vec::new();
        verified.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn unknown_method_fails_without_reading() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);

        let err = pipeline.compress_data("bogus", b"data").unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "bogus"));

        let err = pipeline
            .decompress_and_verify("bogus", Untouchable, &block_checksum(b"data"))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "bogus"));
    }

    #[test]
    fn codec_failures_are_tagged_with_method() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);

        let err = pipeline.compress_data("broken", b"data").unwrap_err();
        assert!(matches!(err, Error::Compress { ref method, .. } if method == "broken"));

        let err = pipeline
            .decompress_and_verify("broken", &b"junk"[..], &block_checksum(b""))
            .unwrap_err();
        assert!(matches!(err, Error::Decode { ref method, .. } if method == "broken"));
        assert!(err.is_corruption());
    }

    #[test]
    fn wrong_checksum_is_integrity_error() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);
        let err = pipeline
            .decompress_and_verify("none", &b"payload"[..], &block_checksum(b"other"))
            .unwrap_err();
        match err {
            Error::IntegrityMismatch { expected, actual } => {
                assert_eq!(expected, block_checksum(b"other"));
                assert_eq!(actual, block_checksum(b"payload"));
            }
            other => panic!("expected integrity mismatch, got {other:?}"),
        }
    }

    #[test]
    fn checksum_comparison_is_exact() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry);
        let upper = block_checksum(b"payload").to_uppercase();
        let err = pipeline
            .decompress_and_verify("none", &b"payload"[..], &upper)
            .unwrap_err();
        assert!(matches!(err, Error::IntegrityMismatch { .. }));
    }
}
