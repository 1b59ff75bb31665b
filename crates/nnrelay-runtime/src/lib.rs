pub mod config;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod registry;
pub mod session;
pub mod store;
pub mod token;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use loader::*;
pub use registry::*;
pub use session::*;
pub use store::*;
pub use token::*;
