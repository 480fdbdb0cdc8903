pub mod coordinator;
pub mod discovery;
pub mod graph;
pub mod providers;
