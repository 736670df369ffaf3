pub mod hierarchy;
pub mod index_sync;
pub mod permission;
pub mod workflow;
