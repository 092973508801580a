pub mod hashing;
pub mod huggingface;
pub mod openai;

pub use hashing::*;
pub use huggingface::*;
pub use openai::*;
