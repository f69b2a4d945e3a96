use std::borrow::Cow;
use std::io::{self, Cursor, Read};

/// Name of the identity pseudo-algorithm. Blocks stored under this method are
/// kept verbatim.
pub const NONE_METHOD: &str = "none";

/// Seekable, re-readable byte stream handed back by the pipeline.
///
/// Borrowed when the bytes pass through untouched, owned when a codec had to
/// produce new bytes. Either way it starts at offset 0 and can be rewound, so a
/// failed upload can be retried from the same stream.
pub type BlockStream<'a> = Cursor<Cow<'a, [u8]>>;

/// Compression capability selected by algorithm name.
///
/// Each `Codec` implementation:
/// - Is identified by a short lowercase `name()` that callers persist next to
///   the stored block (`"gzip"`, `"zstd"`, `"lz4"`, `"none"`).
/// - Is stateless: the same instance is shared by every caller through the
///   [`Registry`](crate::Registry), so it must be `Send + Sync`.
/// - Produces a complete, finalized stream from `compress`; a truncated frame
///   must make `decompress` fail rather than return short data.
pub trait Codec: Send + Sync {
    /// Algorithm name used for registry lookup.
    fn name(&self) -> &'static str;

    /// Compress a whole block, returning the finalized compressed bytes.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress everything `src` yields into memory.
    fn decompress(&self, src: &mut dyn Read) -> io::Result<Vec<u8>>;
}
