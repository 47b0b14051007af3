pub mod breakpoints;
pub use breakpoints::*;

pub mod core;
pub use core::*;

pub mod error;
pub use error::*;

pub mod inspect;
pub use inspect::*;

pub mod logger;
pub use logger::*;

pub mod memory;
pub use memory::*;

pub mod profiler;
pub use profiler::*;

pub mod rpc;
pub use rpc::*;

pub mod session;
pub use session::*;

pub mod step;
pub use step::*;
