pub mod deduplicator;
pub mod joiner;
pub mod normalizer;
