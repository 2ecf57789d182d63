pub mod queue;
pub mod resolver;
pub mod scheduler;
