pub mod consensus;
pub mod contract;
pub mod mining;
pub mod state;
