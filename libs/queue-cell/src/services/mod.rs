pub mod aggregator;
pub mod clock;
pub mod duration;
pub mod estimator;
pub mod memory;
pub mod status;
pub mod store;
pub mod supabase_store;

pub use aggregator::*;
pub use clock::*;
pub use duration::*;
pub use estimator::*;
pub use memory::*;
pub use status::*;
pub use store::*;
pub use supabase_store::*;
