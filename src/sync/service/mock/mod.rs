pub mod client;

pub use client::MockDataService;
