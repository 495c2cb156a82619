/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Machines are addressed by their asset-registry primary key.
pub type MachineId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
