//! Tests for the single-writer run lock
//!
//! Run with: cargo test --test run_lock_test -- --nocapture

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use tidemark_core::adapters::duckdb::DuckDbDatabase;
use tidemark_core::adapters::file_lock::{lock_path_for, RunLock};
use tidemark_core::{CancellationToken, EntryPoint, MigrationError, TidemarkContext};

/// Threads racing for the lock: exactly one wins while it is held
#[test]
fn test_concurrent_lock_attempts() {
    let temp_dir = TempDir::new().unwrap();
    let lock_path = Arc::new(lock_path_for(&temp_dir.path().join("race.duckdb")));

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = vec![];

    for i in 0..4 {
        let barrier = Arc::clone(&barrier);
        let lock_path = Arc::clone(&lock_path);

        let handle = thread::spawn(move || {
            // All threads attempt at once
            barrier.wait();

            let start = Instant::now();
            match RunLock::acquire(&lock_path) {
                Ok(lock) => {
                    println!("Thread {}: acquired after {:?}", i, start.elapsed());
                    // Hold it long enough for everyone else to try
                    thread::sleep(Duration::from_millis(200));
                    drop(lock);
                    true
                }
                Err(e) => {
                    println!("Thread {}: refused after {:?}: {}", i, start.elapsed(), e);
                    assert!(matches!(e, MigrationError::Lock(_)));
                    false
                }
            }
        });

        handles.push(handle);
    }

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1, "Exactly one thread should hold the run lock");
}

/// The lock is released when a run finishes, so runs can follow each other
#[test]
fn test_sequential_runs_reacquire_lock() {
    let temp_dir = TempDir::new().unwrap();
    let migrations = temp_dir.path().join("migrations");
    fs::create_dir_all(&migrations).unwrap();

    let ctx = TidemarkContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();
    ctx.bootstrap().unwrap();

    for i in 1..=3 {
        fs::write(
            migrations.join(format!("V{:03}__step.sql", i)),
            format!("CREATE TABLE step_{} (id INTEGER);", i),
        )
        .unwrap();
        let report = ctx.migrate(&CancellationToken::new());
        assert!(report.is_completed(), "run {}: {:?}", i, report.error);
        assert_eq!(report.executed_count, 1);
    }
}

/// Bootstrap refuses to run while a migration holds the lock
#[test]
fn test_bootstrap_respects_lock() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = TidemarkContext::new(temp_dir.path(), EntryPoint::Cli).unwrap();

    let _held = RunLock::acquire(&lock_path_for(&ctx.config.database_path)).unwrap();
    let err = ctx.bootstrap().unwrap_err();
    assert!(matches!(err, MigrationError::Lock(_)));
}

/// Database files can be reopened right after being closed
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let db = DuckDbDatabase::open(&db_path).unwrap();
        db.with_connection(|conn| conn.execute_batch("CREATE TABLE IF NOT EXISTS t (id INTEGER);"))
            .unwrap();
        println!("Connection {}: opened in {:?}", i, start.elapsed());
    }
}
