//! Core building blocks for retrieval pipelines: chunking, encoding and
//! vector index management, plus the `rcore` CLI glue.

pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{AppError, ChunkError, EncoderError, IndexError, PipelineError};
pub use models::{Config, EncoderMode, Metric, OutputFormat};
pub use services::{
    Chunker, Encoder, PairEncoder, Pipeline, TrainablePairEncoder, VectorIndex,
    VectorIndexManager,
};
