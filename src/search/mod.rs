pub mod index;
pub mod retriever;
