//! End-to-end passes over the in-memory catalog and index.

use chrono::{DateTime, TimeZone, Utc};
use checkpoint::{CheckpointLedger, JsonFileStore, MemoryStore, Watermark};
use film_sync::{run_pass, run_with, Schedule};
use film_sync_postgresql_source::testing::{MemorySource, Query};
use index_sink::testing::RecordingSink;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sync_core::{FilmWorkColumns, Role, Stream};
use tempfile::TempDir;
use uuid::Uuid;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap()
}

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn film(n: u128, title: &str, modified: DateTime<Utc>) -> FilmWorkColumns {
    FilmWorkColumns {
        id: id(n),
        title: title.to_string(),
        description: Some(format!("{title}, restored")),
        rating: Some(8.1),
        kind: Some("movie".to_string()),
        created: Some(modified),
        modified,
    }
}

/// One film with one director and one genre.
fn cold_catalog() -> MemorySource {
    let source = MemorySource::new();
    source.put_film_work(film(1, "Stalker", ts(0)));
    source.put_person(id(10), "Andrei Tarkovsky", ts(0));
    source.put_genre(id(20), "Sci-Fi", ts(0));
    source.link_person(id(1), id(10), Role::Director);
    source.link_genre(id(1), id(20));
    source
}

async fn committed(ledger: &CheckpointLedger<impl checkpoint::CheckpointStore>) -> Vec<Watermark> {
    let mut out = Vec::new();
    for stream in Stream::ALL {
        out.push(ledger.committed(stream.as_str()).await.unwrap());
    }
    out
}

#[tokio::test]
async fn test_cold_start() {
    let source = cold_catalog();
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();

    let report = run_pass(&source, &ledger, &sink).await.unwrap();

    assert!(report.aborted().is_empty());
    assert_eq!(sink.provision_calls(), 1);

    let indexed = sink.indexed();
    assert_eq!(indexed.len(), 1);
    let doc = &indexed[&id(1)];
    assert_eq!(doc.title, "Stalker");
    assert_eq!(doc.imdb_rating, Some(8.1));
    assert_eq!(doc.genres, vec!["Sci-Fi"]);
    assert_eq!(doc.directors_names, vec!["Andrei Tarkovsky"]);
    assert_eq!(doc.directors[0].id, id(10));
    assert!(doc.actors.is_empty());
    assert!(doc.writers_names.is_empty());

    assert_eq!(
        committed(&ledger).await,
        vec![
            Watermark::at(ts(0), id(10)),
            Watermark::at(ts(0), id(20)),
            Watermark::at(ts(0), id(1)),
        ]
    );
}

#[tokio::test]
async fn test_checkpoints_never_move_backwards() {
    let source = cold_catalog();
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();

    run_pass(&source, &ledger, &sink).await.unwrap();
    let first = committed(&ledger).await;

    source.put_film_work(film(2, "Mirror", ts(30)));
    run_pass(&source, &ledger, &sink).await.unwrap();
    let second = committed(&ledger).await;

    run_pass(&source, &ledger, &sink).await.unwrap();
    let third = committed(&ledger).await;

    for ((a, b), c) in first.iter().zip(&second).zip(&third) {
        assert!(a <= b && b <= c);
    }
    assert_eq!(second[2], Watermark::at(ts(30), id(2)));
    assert_eq!(second, third);
}

#[tokio::test]
async fn test_genre_rename_reaches_document() {
    let source = cold_catalog();
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();
    run_pass(&source, &ledger, &sink).await.unwrap();

    // film_work.modified stays untouched
    source.put_genre(id(20), "Science Fiction", ts(90));
    let report = run_pass(&source, &ledger, &sink).await.unwrap();

    assert_eq!(report.documents(), 1);
    assert_eq!(sink.indexed()[&id(1)].genres, vec!["Science Fiction"]);
}

#[tokio::test]
async fn test_aborted_stream_does_not_stop_the_pass() {
    let source = cold_catalog();
    source.fail_on(Query::ChangedRoots(Stream::Person));
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();

    let report = run_pass(&source, &ledger, &sink).await.unwrap();

    assert_eq!(report.aborted(), vec![Stream::Person]);
    assert_eq!(ledger.committed("person").await.unwrap(), Watermark::Earliest);
    assert_eq!(
        ledger.committed("film_work").await.unwrap(),
        Watermark::at(ts(0), id(1))
    );

    source.heal();
    let report = run_pass(&source, &ledger, &sink).await.unwrap();
    assert!(report.aborted().is_empty());
    assert_eq!(
        ledger.committed("person").await.unwrap(),
        Watermark::at(ts(0), id(10))
    );
}

#[tokio::test]
async fn test_write_failure_keeps_committed_state_on_disk() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state").join("state.json");
    let source = cold_catalog();
    let sink = RecordingSink::new();
    sink.fail_all(true);

    let ledger = CheckpointLedger::new(JsonFileStore::new(&state_path));
    let err = run_pass(&source, &ledger, &sink).await.unwrap_err();
    assert!(format!("{err:#}").contains("person"));

    // a restarted process sees the same file
    let ledger = CheckpointLedger::new(JsonFileStore::new(&state_path));
    let state = ledger.load("person").await.unwrap();
    assert_eq!(state.committed, Watermark::Earliest);
    assert_eq!(state.in_flight_root, Watermark::at(ts(0), id(10)));
    assert!(sink.documents().is_empty());
}

#[tokio::test]
async fn test_rerun_after_failure_reproduces_the_same_documents() {
    let reference = RecordingSink::new();
    run_pass(
        &cold_catalog(),
        &CheckpointLedger::new(MemoryStore::new()),
        &reference,
    )
    .await
    .unwrap();

    let source = cold_catalog();
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();
    sink.script([false]);
    assert!(run_pass(&source, &ledger, &sink).await.is_err());

    run_pass(&source, &ledger, &sink).await.unwrap();
    assert_eq!(sink.batches(), reference.batches());
    assert_eq!(committed(&ledger).await.len(), 3);
    assert_eq!(
        ledger.committed("person").await.unwrap(),
        Watermark::at(ts(0), id(10))
    );
}

#[tokio::test]
async fn test_run_once() {
    let source = Arc::new(cold_catalog());
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();
    let schedule = Schedule {
        interval: Duration::from_secs(900),
        once: true,
    };

    run_with(
        || {
            let source = Arc::clone(&source);
            async move { anyhow::Ok(source) }
        },
        &ledger,
        &sink,
        schedule,
    )
    .await
    .unwrap();

    assert_eq!(sink.indexed().len(), 1);
    // once at startup, once per pass
    assert_eq!(sink.provision_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_connects_once_per_pass() {
    let source = Arc::new(cold_catalog());
    let ledger = CheckpointLedger::new(MemoryStore::new());
    let sink = RecordingSink::new();
    let connects = AtomicU32::new(0);

    let err = run_with(
        || {
            let n = connects.fetch_add(1, Ordering::SeqCst) + 1;
            let source = Arc::clone(&source);
            async move {
                if n == 3 {
                    anyhow::bail!("database went away");
                }
                Ok::<_, anyhow::Error>(source)
            }
        },
        &ledger,
        &sink,
        Schedule::default(),
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("database went away"));
    assert_eq!(connects.load(Ordering::SeqCst), 3);
    // only the first pass had anything to write
    assert_eq!(sink.batches().len(), 3);
}
