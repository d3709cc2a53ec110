//! Shared configuration types for conduit pipelines.

mod base;
mod channel;
mod consumer;
mod dispatch;
mod pipeline;

pub use base::ValidationError;
pub use channel::ChannelConfig;
pub use consumer::ConsumerConfig;
pub use dispatch::DispatchConfig;
pub use pipeline::PipelineConfig;
