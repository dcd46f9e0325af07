mod atomic;
mod basic;
mod interface;

pub use atomic::*;
pub use basic::*;
pub use interface::*;
