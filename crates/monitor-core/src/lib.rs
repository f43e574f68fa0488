pub mod error;
pub mod signal;
pub mod traits;
pub mod types;

pub use error::*;
pub use signal::*;
pub use traits::*;
pub use types::*;
