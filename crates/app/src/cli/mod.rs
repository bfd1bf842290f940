pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Cat, Checkpoint, Df, Init, Ls, Mkdir, Put, Rm, Stat, SyncLog, Version};
