pub mod answer;
pub mod ingest;
pub mod kmeans;
pub mod merger;
pub mod pipeline;
pub mod reducer;
pub mod reorder;
pub mod retriever;
pub mod store;

pub use answer::{stuff_prompt, Answerer, OpenAiChatAnswerer};
pub use ingest::{ingest_text, load_corpus, TextSplitter};
pub use kmeans::{KMeans, KMeansResult};
pub use merger::merge;
pub use pipeline::{AnswerOutput, Pipeline, PipelineOutput, RetrieverFailure, StageTimings};
pub use reducer::{Cluster, ClusteringFilter, Reducer, RedundancyFilter};
pub use reorder::reorder;
pub use retriever::{maximal_marginal_relevance, Retriever};
pub use store::{DocumentStore, StoreSnapshot, VectorIndex};
