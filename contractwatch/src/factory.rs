mod abi_sources;
mod contracts;
mod dispatchers;
mod logs;
mod providers;

pub use abi_sources::*;
pub use contracts::*;
pub use dispatchers::*;
pub use logs::*;
pub use providers::*;
