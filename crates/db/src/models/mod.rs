pub mod machine;
pub mod sensor_log;
