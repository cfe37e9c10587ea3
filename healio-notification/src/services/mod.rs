mod store;
mod mongo;
mod memory;
mod builders;

pub use store::*;
pub use mongo::*;
pub use memory::*;
pub use builders::*;
