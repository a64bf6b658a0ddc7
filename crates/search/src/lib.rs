//! Tokenization and BM25 ranking: the query side of the document index.

mod bm25;
mod tokenizer;

pub use bm25::Bm25Index;
pub use tokenizer::{tokenize, TOKENIZER_NAME};
