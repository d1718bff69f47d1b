pub mod aggregate;
pub mod cli;
pub mod collect;
pub mod config;
pub mod discover;
pub mod error;
pub mod hits;
pub mod instrument;
pub mod model;
pub mod paths;
pub mod probe_map;
pub mod report;
pub mod store;
