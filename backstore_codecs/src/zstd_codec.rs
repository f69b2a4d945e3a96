use std::io::{self, Read};

use backstore_core::Codec;

/// Zstandard frame codec.
///
/// Best ratio-for-speed trade-off of the bundled codecs at the default
/// level (3).
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        zstd::stream::encode_all(data, self.level)
    }

    fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>> {
        zstd::stream::decode_all(src)
    }
}
