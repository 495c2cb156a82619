use std::io::Write;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};

use plantwatch_replay::{Ai4iOptions, LoadReport, ReplaySourceError, ReplayTable};

const HEADER: &str = "UDI,Product ID,Type,Air temperature [K],Process temperature [K],Rotational speed [rpm],Torque [Nm],Tool wear [min],Machine failure,TWF,HDF,PWF,OSF,RNF";

#[test]
fn loads_ai4i_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    writeln!(file, "1,M14860,M,298.1,308.6,1551,42.8,0,0,0,0,0,0,0").unwrap();
    writeln!(file, "2,L47181,L,298.2,308.7,1408,46.3,3,0,0,0,0,0,0").unwrap();
    writeln!(file, "3,L47182,L,298.1,308.5,1498,49.4,5,1,0,0,0,1,0").unwrap();
    file.flush().unwrap();

    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let options = Ai4iOptions::new(vec![3, 4], now);
    let (table, report) = ReplayTable::from_ai4i_csv(file.path(), &options).unwrap();

    assert_eq!(report, LoadReport { loaded: 3, skipped: 0 });
    assert_eq!(table.get(0).unwrap().timestamp(), now - Duration::days(30));
    assert_eq!(table.get(1).unwrap().machine_id(), 4);

    let last = &table.get(2).unwrap().snapshot;
    assert!(last.target);
    assert_eq!(last.failure_type.as_deref(), Some("Overstrain Failure (OSF)"));
    assert_eq!(last.torque_nm, Some(49.4));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let options = Ai4iOptions::new(vec![1], Utc::now());
    assert_matches!(
        ReplayTable::from_ai4i_csv(dir.path().join("absent.csv"), &options),
        Err(ReplaySourceError::Io(_))
    );
}
