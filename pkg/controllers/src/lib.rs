//! Controllers that resolve workload offerings and enforce project quota.

pub mod app;
pub mod computeclass;
pub mod condition;
pub mod offerings;
pub mod quota;

#[cfg(test)]
mod testing;
