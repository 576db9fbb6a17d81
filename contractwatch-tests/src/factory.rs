mod contracts;
mod events;
mod providers;

pub use contracts::*;
pub use events::*;
pub use providers::*;
