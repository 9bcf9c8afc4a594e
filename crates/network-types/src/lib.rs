//! Network messages exchanged between document anchoring peers and the services that answer them.

mod request;
mod response;
mod services;
pub use request::*;
pub use response::*;
pub use services::*;
