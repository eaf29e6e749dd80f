//! End-to-end: run a timeline and write the fixture bundle.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use eventseq_core::{verify_partition, EventsDocument, StepsDocument};
use eventseq_engine::{FixtureWriter, RunOptions, Runner};
use eventseq_testkit::{fixtures, FakeExporter, InMemoryProvider};
use sha2::{Digest, Sha256};

#[tokio::test(start_paused = true)]
async fn create_update_bundle_on_disk() {
    let data_dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let provider = Arc::new(InMemoryProvider::with_lag(Duration::from_millis(800)));
    let exporter = FakeExporter::new(Arc::clone(&provider));

    let writer = FixtureWriter::new(data_dir.path(), "customer_cu");
    writer.prepare().unwrap();

    let options = RunOptions {
        scratch_dir: scratch.path().to_path_buf(),
        write_diff_files: false,
        ..RunOptions::default()
    };
    let record = Runner::new(&*provider, options)
        .with_exporter(&exporter)
        .run(fixtures::create_update(&provider))
        .await
        .unwrap();
    let steps = writer.write(record).unwrap();

    let dir = writer.dir();
    for i in 0..3 {
        assert!(dir.join(format!("downloads/dl-step-{}.snapshot", i)).is_file());
    }
    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);

    let meta: StepsDocument =
        serde_json::from_str(&fs::read_to_string(dir.join("meta.json")).unwrap()).unwrap();
    let events: EventsDocument =
        serde_json::from_str(&fs::read_to_string(dir.join("events.json")).unwrap()).unwrap();
    assert_eq!(meta.steps, steps);
    assert_eq!(events.events.len(), 2);
    verify_partition(&meta.steps, events.events.len()).unwrap();

    assert_eq!(meta.steps[0].tags, ["c"]);
    assert_eq!(meta.steps[1].tags, ["u"]);
    assert_eq!(
        meta.steps[0].snapshot_file.as_deref(),
        Some("downloads/dl-step-0.snapshot")
    );
    for step in &meta.steps {
        let file = dir.join(step.snapshot_file.as_ref().unwrap());
        let digest = format!("{:x}", Sha256::digest(fs::read(file).unwrap()));
        assert_eq!(step.snapshot_sha256.as_deref(), Some(digest.as_str()));
    }

    let raw = fs::read_to_string(dir.join("meta.json")).unwrap();
    assert!(raw.starts_with("{\n    \"steps\": ["));

    let md = fs::read_to_string(dir.join("steps.md")).unwrap();
    assert!(md.starts_with("--- step_id-0, c, has_dl, 2020-09-13T12:26:40.000Z ---\n"));
    assert!(md.contains("- 0. `customer.created`, `cus_1`, `evt_000001`"));
    assert!(md.contains("--- step_id-1, u, has_dl, 2020-09-13T12:26:43.000Z ---"));
    assert!(md.contains("--- step_id-2, has_dl,  ---"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_extension_is_configurable() {
    let data_dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(InMemoryProvider::new());
    let exporter = FakeExporter::new(Arc::clone(&provider));
    let writer = FixtureWriter::new(data_dir.path(), "k").with_snapshot_extension("sqlite");
    writer.prepare().unwrap();

    let options = RunOptions {
        scratch_dir: data_dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let record = Runner::new(&*provider, options)
        .with_exporter(&exporter)
        .run(fixtures::create_update(&provider))
        .await
        .unwrap();
    let steps = writer.write(record).unwrap();
    assert_eq!(
        steps[2].snapshot_file.as_deref(),
        Some("downloads/dl-step-2.sqlite")
    );
}
