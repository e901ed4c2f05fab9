pub mod committed;
pub mod energy;
pub mod staged;
