// src/lib.rs

pub mod aggregate;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod process;
pub mod store;
