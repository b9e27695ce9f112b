pub mod agent;
pub mod gateway;
pub mod memory;
pub mod onboard;
