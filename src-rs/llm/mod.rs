pub mod agents;
pub mod models;
pub mod tools;
pub mod utils;
