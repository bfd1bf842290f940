mod cat;
mod checkpoint;
mod df;
mod init;
mod ls;
mod mkdir;
mod put;
mod rm;
mod stat;
mod sync;
mod version;

pub use cat::Cat;
pub use checkpoint::Checkpoint;
pub use df::Df;
pub use init::Init;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use put::Put;
pub use rm::Rm;
pub use stat::Stat;
pub use sync::SyncLog;
pub use version::Version;
