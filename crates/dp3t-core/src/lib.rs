//! Core types for DP3T secure persistence: domain values, record naming and
//! the secure byte store contract. Kept small so platform backends stay swappable.

pub mod keys;
pub mod records;
pub mod storage;
