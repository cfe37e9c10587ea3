pub mod api;
pub mod notification;
pub mod realtime;

pub use api::*;
pub use notification::*;
pub use realtime::*;
