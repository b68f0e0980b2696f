pub mod chunker;
pub mod encoder;
pub mod index;
mod pipeline;

pub use chunker::{Chunker, SentenceChunker, WindowChunker, build_chunker};
pub use encoder::{
    Encoder, HashingEncoder, HashingPairEncoder, OnnxCrossEncoder, OnnxEncoder, PairEncoder,
    TrainablePairEncoder, build_encoder, build_reranker,
};
pub use index::{
    CreateOutcome, DeleteAll, IndexBackend, IndexOptions, MemoryBackend, PgVectorBackend,
    QdrantBackend, VectorIndex, VectorIndexManager, create_backend,
};
pub use pipeline::{CHUNK_INDEX_FIELD, DOC_ID_FIELD, Pipeline, TEXT_FIELD};
