pub mod persistence;
pub mod queue;
