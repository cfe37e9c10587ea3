mod health;
mod notifications;
mod system;

pub use health::*;
pub use notifications::*;
pub use system::*;
