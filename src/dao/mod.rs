/// Challenge persistence backends and the `ChallengeStore` trait.
pub mod challenge_store;
/// Database model definitions.
pub mod models;
/// External game schedule/score source.
pub mod schedule;
/// Storage abstraction layer for database operations.
pub mod storage;
