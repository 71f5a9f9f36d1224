pub mod factory;
pub mod queue;
pub mod runner;
pub mod services;
