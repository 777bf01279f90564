pub mod batch;
pub mod client;
#[cfg(test)]
mod fake_fal;
pub mod handlers;
pub mod parser;
pub mod prompt_source;
pub mod records;
pub mod router;
pub mod types;

pub use router::{streaming_router, videogen_router};
