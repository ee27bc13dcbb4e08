//! Public library modules for the CLI crate
pub mod backend;
pub mod logging;
pub mod report;
pub mod scope;
