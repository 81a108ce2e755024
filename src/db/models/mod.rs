//! Entity models, one module per collection.

pub mod attendee;
pub mod common;
pub mod session;
pub mod speaker;
pub mod todo;

pub use attendee::*;
pub use common::*;
pub use session::*;
pub use speaker::*;
pub use todo::*;
