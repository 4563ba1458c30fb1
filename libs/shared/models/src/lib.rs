pub mod appointment;
pub mod service;

pub use appointment::*;
pub use service::*;
