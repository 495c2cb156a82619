use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;

use plantwatch_core::error::CoreError;
use plantwatch_core::ports::{TelemetryReader, TelemetryWriter};
use plantwatch_core::telemetry::TelemetrySnapshot;
use plantwatch_db::models::machine::CreateMachine;
use plantwatch_db::repositories::{MachineRepo, SensorLogRepo};
use plantwatch_db::PgTelemetryStore;

async fn seed_machine(pool: &PgPool) -> i64 {
    MachineRepo::create(
        pool,
        &CreateMachine {
            model_name: "Prusa MK4".into(),
            location: Some("Bay 1".into()),
            install_date: None,
        },
    )
    .await
    .unwrap()
    .id
}

fn snapshot(machine_id: i64, minutes: i64, rpm: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        machine_id,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes),
        air_temp_k: Some(300.1),
        process_temp_k: Some(470.0),
        rpm: Some(rpm),
        torque_nm: None,
        tool_wear_min: Some(12.0),
        target: false,
        failure_type: None,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    plantwatch_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_latest_distinguishes_no_data_from_unknown(pool: PgPool) {
    let store = PgTelemetryStore::new(pool.clone());
    let id = seed_machine(&pool).await;

    assert_eq!(store.latest(id).await.unwrap(), None);
    assert_matches!(store.latest(id + 1000).await, Err(CoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_append_then_latest(pool: PgPool) {
    let store = PgTelemetryStore::new(pool.clone());
    let id = seed_machine(&pool).await;

    store.append(&snapshot(id, 0, 1500.0)).await.unwrap();
    store.append(&snapshot(id, 5, 0.0)).await.unwrap();

    let latest = store.latest(id).await.unwrap().unwrap();
    assert_eq!(latest.rpm, Some(0.0));
    assert_eq!(latest.torque_nm, None);
    assert_eq!(SensorLogRepo::count_for_machine(&pool, id).await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_recent_is_oldest_first(pool: PgPool) {
    let store = PgTelemetryStore::new(pool.clone());
    let id = seed_machine(&pool).await;
    for i in 0..5 {
        store.append(&snapshot(id, i * 5, 1400.0 + i as f64)).await.unwrap();
    }

    let recent = store.recent(id, 3).await.unwrap();
    let rpms: Vec<_> = recent.iter().filter_map(|s| s.rpm).collect();
    assert_eq!(rpms, vec![1402.0, 1403.0, 1404.0]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_append_for_unknown_machine_is_rejected(pool: PgPool) {
    let store = PgTelemetryStore::new(pool);
    assert_matches!(
        store.append(&snapshot(424_242, 0, 1500.0)).await,
        Err(CoreError::Rejected(_))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_machine_lookup(pool: PgPool) {
    let store = PgTelemetryStore::new(pool.clone());
    let id = seed_machine(&pool).await;

    let machine = store.machine(id).await.unwrap();
    assert_eq!(machine.model_name, "Prusa MK4");
    assert_eq!(store.machine_ids().await.unwrap(), vec![id]);
    assert!(store.machine(id + 1).await.unwrap_err().is_not_found());
}
