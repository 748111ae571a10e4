//! 通用工具模块

pub mod address;
pub mod math;
pub mod time;

pub use address::*;
pub use math::*;
pub use time::*;
