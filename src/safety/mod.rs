//! Fault injection for robustness testing

pub mod injector;

pub use injector::*;
