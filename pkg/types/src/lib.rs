pub mod app;
pub mod computeclass;
pub mod condition;
pub mod config;
pub mod project;
pub mod quantity;
pub mod quota;
pub mod workload;
