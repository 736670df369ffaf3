pub mod hierarchy;
pub mod index;
pub mod permission;
pub mod unit_of_work;
pub mod workflow;
