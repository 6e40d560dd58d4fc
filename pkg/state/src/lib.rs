pub mod client;
pub mod memory;
pub mod object;
pub mod store;
