pub mod benchmark;
pub mod catalog;
pub mod error;
pub mod histogram;
pub mod latency;
pub mod workload;
