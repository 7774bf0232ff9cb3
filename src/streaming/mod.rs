pub mod backend;
pub mod domain;
pub mod engine;
pub mod runtime;
pub mod types;
