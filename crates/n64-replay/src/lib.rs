pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod movie;
pub mod savestate;
pub mod seek;
pub mod session;
pub mod warp;

pub use config::ReplayConfig;
pub use engine::{ExecutionCore, NullHooks, ReplayEvent, ReplayHooks, RomIdentity};
pub use movie::{InputSample, MovieError, MovieHeader, Task};
pub use savestate::{MachineSnapshot, StateError};
pub use session::ReplaySession;
