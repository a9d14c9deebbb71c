// Provider and planner configuration
pub mod config;

// Completion-service contract and HTTP client
pub mod completion;

// Plan store (SQLite persistence)
pub mod database;

// Error taxonomy
pub mod error;

// Request -> scope -> tree pipeline
pub mod orchestrator;

// Scope extraction and task generation
pub mod planner;
