pub mod elastic;
pub mod qdrant;

pub use elastic::ElasticStore;
pub use qdrant::QdrantStore;
