pub mod extraction;
pub mod ingest;
pub mod structuring;
