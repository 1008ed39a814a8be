pub mod sts;
pub mod traits;

pub use traits::*;
