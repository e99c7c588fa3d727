pub mod config;
pub mod context;
pub mod coordinator;
pub mod duration;
pub mod orchestrator;
pub mod registry;
pub mod runner;
pub mod store;
