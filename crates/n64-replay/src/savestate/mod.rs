pub mod codec;
pub mod compress;
pub(crate) mod cursor;
pub mod queue;
pub mod snapshot;

pub use codec::{decode, encode, Decoded, Encoded};
pub use queue::{Job, Medium, QueueHandle, SavestateTask, TaskOutcome, TaskTag};
pub use snapshot::{MachineSnapshot, Screenshot};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("savestate truncated: needed {needed} bytes, buffer has {available}")]
    Truncated { needed: usize, available: usize },
    #[error("savestate is malformed: {0}")]
    Malformed(&'static str),
    #[error("failed to decompress savestate: {0}")]
    Decompression(String),
    #[error("interrupt event queue has no terminator within the scan limit")]
    EventQueueTooLong,
    #[error("{0} pending interrupt events exceed the savestate event queue capacity")]
    TooManyEvents(usize),
    #[error("failed to write savestate: {0}")]
    FileWrite(#[source] std::io::Error),
    #[error("savestate not found or empty")]
    NotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cancelled by user")]
    Cancelled,
    #[error("core is not running")]
    CoreNotLaunched,
}
