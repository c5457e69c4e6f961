pub mod advisory;
pub mod contract;
