pub mod models;
pub mod services;
pub mod error;

pub use models::*;
pub use error::*;
pub use services::*;
pub use shared_config::{PeakWindow, QueueConfig};
