//! Linear task-pipeline abstraction: schema, exchange store, and runner.

pub mod dot;
pub mod exchange;
pub mod history;
pub mod runner;
pub mod schema;
pub mod stage;
pub mod state;
