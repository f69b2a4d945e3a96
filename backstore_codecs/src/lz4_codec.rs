use std::io::{self, Read, Write};

use backstore_core::Codec;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};

/// LZ4 frame codec.
///
/// Fastest of the bundled codecs. Uses the LZ4 frame format rather than raw
/// size-prefixed blocks so that streams written by other frame-format
/// implementations decode here too.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = FrameEncoder::new(Vec::new());
        encoder.write_all(data)?;
        encoder.finish().map_err(io::Error::from)
    }

    fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>> {
        let mut block = Vec::new();
        FrameDecoder::new(src).read_to_end(&mut block)?;
        Ok(block)
    }
}
