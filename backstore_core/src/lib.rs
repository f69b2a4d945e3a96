pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod exec;
pub mod mount;
pub mod names;
pub mod pipeline;
pub mod registry;

pub use checksum::{block_checksum, file_checksum, PRESERVED_CHECKSUM_LENGTH};
pub use codec::{BlockStream, Codec, NONE_METHOD};
pub use config::Timeouts;
pub use error::{Error, Result};
pub use exec::Executor;
pub use mount::{ForceUnmounter, MountProbe, Reconciler};
#[cfg(unix)]
pub use mount::SystemMounter;
pub use pipeline::Pipeline;
pub use registry::Registry;
