mod batch;
mod chunk;
mod config;
mod index;
mod mode;
mod query;
mod record;
mod search;

pub use batch::{BatchFailure, BatchReport, BatchSummary};
pub use chunk::Chunk;
pub use config::{
    ChunkStrategy, ChunkingConfig, Config, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_INDEX_NAME,
    DEFAULT_POSTGRES_URL, DEFAULT_QDRANT_URL, EncoderConfig, EncoderKind, IndexConfig,
    RerankerConfig, RerankerKind, SearchConfig, VectorDriver,
};
pub use index::{IndexDescriptor, MAX_INDEX_NAME_LEN, Metric, Placement, validate_index_name};
pub use mode::EncoderMode;
pub use query::{QueryMatch, compare_matches, rank_matches};
pub use record::{
    EmbeddingRecord, Metadata, MetadataFilter, MetadataValue, RESERVED_ID_KEY, Vector,
};
pub use search::{OutputFormat, SearchHit, SearchResults};
