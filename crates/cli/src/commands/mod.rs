pub mod acquire;
pub mod force_release;
pub mod release;
pub mod status;
