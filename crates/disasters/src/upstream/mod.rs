//! Clients for the hosted services the pipeline depends on

pub mod embedding;
pub mod generation;
pub mod transport;
pub mod vector_index;
