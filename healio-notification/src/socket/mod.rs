mod handlers;
mod hub;

pub use handlers::*;
pub use hub::*;
