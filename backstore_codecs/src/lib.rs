mod gzip_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::{Arc, OnceLock};

use backstore_core::{Codec, Error, Registry};

/// Registry holding every bundled codec under its algorithm name.
///
/// Built on first use and shared for the life of the process.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        Registry::builder()
            .register(PassThroughCodec)
            .register(GzipCodec::default())
            .register(ZstdCodec::default())
            .register(Lz4Codec)
            .build()
    })
}

/// Resolve a bundled codec from the method name stored with a block.
pub fn codec_by_name(name: &str) -> Result<Arc<dyn Codec>, Error> {
    registry()
        .lookup(name)
        .ok_or_else(|| Error::UnsupportedMethod(name.to_string()))
}
