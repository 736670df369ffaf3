pub mod cache;
pub mod persistence;
pub mod search;
