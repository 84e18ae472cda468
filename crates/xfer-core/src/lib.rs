pub mod checksum;
pub mod chunk;
pub mod client;
pub mod config;
pub mod context;
pub mod fault;
pub mod logging;
pub mod message;
pub mod pipeline;
pub mod policy;
pub mod range;
pub mod reliable;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::TransferClient;
pub use context::Context;
pub use fault::{Fault, TransportErrorKind};
pub use pipeline::{Pipeline, PipelineBuilder};
