use std::io::{self, Read, Write};

use backstore_core::Codec;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// gzip (RFC 1952) stream codec.
///
/// Slowest of the bundled codecs, kept for blocks written by older stores that
/// defaulted to gzip.
pub struct GzipCodec {
    pub level: Compression,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>> {
        let mut block = Vec::new();
        GzDecoder::new(src).read_to_end(&mut block)?;
        Ok(block)
    }
}
