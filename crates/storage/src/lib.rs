#![forbid(unsafe_code)]

mod engine;
mod store;

pub use engine::Engine;
pub use store::*;
