pub mod pinecone;

pub use pinecone::{PineconeClient, PineconeIndex};
