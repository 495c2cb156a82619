//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod machine_repo;
pub mod sensor_log_repo;

pub use machine_repo::MachineRepo;
pub use sensor_log_repo::SensorLogRepo;
