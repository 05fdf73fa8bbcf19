pub mod file;
pub mod freeze;
pub mod header;
pub mod input;
pub mod recorder;

pub use file::{
    convert_freeze_buffer_to_movie, parse_header, read_movie, read_movie_inputs,
    replace_author_info, write_movie, Movie,
};
pub use freeze::{MovieFreeze, RestoreMode};
pub use header::{MovieHeader, PluginNames};
pub use input::InputSample;
pub use recorder::{MovieLog, PollOutcome, Task};

use crate::savestate::StateError;

#[derive(Debug, thiserror::Error)]
pub enum MovieError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not an M64 movie (bad magic)")]
    BadMagic,
    #[error("unsupported movie version {0}")]
    UnsupportedVersion(u32),
    #[error("movie file is truncated")]
    Truncated,
    #[error("the savestate is not from this movie")]
    NotFromThisMovie,
    #[error("the savestate frame is outside the bounds of the movie")]
    InvalidFrame,
    #[error("the savestate freeze buffer format is invalid")]
    InvalidFormat,
    #[error("no movie is active")]
    NoMovie,
    #[error("a movie is already active")]
    AlreadyActive,
    #[error("cancelled by user")]
    Cancelled,
    #[error(transparent)]
    State(#[from] StateError),
}
