use std::io::{self, Read};

use backstore_core::{Codec, NONE_METHOD};

/// Identity codec registered as `"none"`: blocks are stored verbatim.
///
/// Useful for data that is already compressed (images, archives) where a real
/// codec would only add CPU time and framing overhead.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        NONE_METHOD
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>> {
        let mut block = Vec::new();
        src.read_to_end(&mut block)?;
        Ok(block)
    }
}
