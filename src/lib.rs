pub mod types;
pub mod error;
pub mod protocol;
pub mod profile;
pub mod telemetry;
pub mod system;
pub mod session;
pub mod reconciler;
pub mod controller;

pub use types::*;
pub use error::SessionError;
pub use controller::*;
