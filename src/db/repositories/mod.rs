pub mod occupancy;
pub mod zones;
