mod common;

use anyhow::Result;
use common::{write_sample, write_sample_with_short_strings, write_text_decoy};
use questscan::{
    CancellationToken, Digest, ExtractError, MachOExtractor, RegionExtractor, RegionKind, Regions,
    RunState, ScanConfig, ScanReport, Scanner, ShutdownCoordinator,
};
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn config(root: &Path, jobs: usize) -> ScanConfig {
    ScanConfig {
        root_path: Some(root.to_path_buf()),
        jobs: NonZeroUsize::new(jobs).unwrap(),
        show_progress: false,
        ..Default::default()
    }
}

fn run(root: &Path, jobs: usize) -> Result<ScanReport> {
    let coordinator = ShutdownCoordinator::new();
    let report = Scanner::new(config(root, jobs)).run(&coordinator, |_| Ok(()))?;
    assert_eq!(coordinator.state(), RunState::Terminated);
    Ok(report)
}

/// Eight samples sharing three code bodies, plus decoys and off-size files
fn create_corpus(root: &Path) -> Result<()> {
    let bodies: [&[u8]; 3] = [b"\x55\x48\x89\xe5\xc3", b"\x31\xc0\xc3", b"\x90\x90\xc3"];
    for i in 0..8 {
        let strings = format!("/Library/mixpanel{}\0toidievitceffe\0", i % 4);
        write_sample(
            &root.join(format!("batch{}/sample_{:02}", i % 2, i)),
            bodies[i % 3],
            strings.as_bytes(),
        )?;
    }
    write_text_decoy(&root.join("batch0/readme.sh"))?;
    fs::write(root.join("batch1/small.bin"), vec![0u8; 1024])?;
    Ok(())
}

#[test]
fn test_identical_text_is_counted_twice() -> Result<()> {
    let dir = tempdir()?;
    write_sample(&dir.path().join("a"), b"same code", b"alpha\0")?;
    write_sample(&dir.path().join("b"), b"same code", b"beta\0")?;
    write_text_decoy(&dir.path().join("c"))?;

    let report = run(dir.path(), 1)?;

    assert_eq!(report.code.len(), 1);
    assert_eq!(report.code.count(&Digest::of(b"same code")), 2);
    assert_eq!(report.strings.len(), 2);
    assert_eq!(report.strings.count(&Digest::of(b"alpha\0")), 1);
    assert_eq!(report.strings.count(&Digest::of(b"beta\0")), 1);
    assert_eq!(report.stats.candidates, 3);
    assert_eq!(report.stats.files_not_applicable, 1);
    assert!(!report.interrupted);
    Ok(())
}

#[test]
fn test_short_strings_still_count_code() -> Result<()> {
    let dir = tempdir()?;
    write_sample(&dir.path().join("a"), b"shared code", b"alpha\0")?;
    write_sample_with_short_strings(&dir.path().join("b"), b"shared code")?;

    let report = run(dir.path(), 2)?;

    assert_eq!(report.code.count(&Digest::of(b"shared code")), 2);
    assert_eq!(report.strings.total(), 1);
    assert_eq!(report.strings.count(&Digest::of(b"alpha\0")), 1);
    assert_eq!(report.stats.files_not_applicable, 0);
    assert_eq!(report.stats.regions_recorded, 3);
    Ok(())
}

#[test]
fn test_parallel_matches_sequential() -> Result<()> {
    let dir = tempdir()?;
    create_corpus(dir.path())?;

    let sequential = run(dir.path(), 1)?;
    let parallel = run(dir.path(), 4)?;

    assert_eq!(sequential.code, parallel.code);
    assert_eq!(sequential.strings, parallel.strings);
    assert_eq!(sequential.code.total(), 8);
    assert_eq!(sequential.strings.len(), 4);
    assert_eq!(sequential.stats.candidates, 9);
    assert_eq!(parallel.stats.files_processed, 9);
    Ok(())
}

#[test]
fn test_more_workers_than_samples() -> Result<()> {
    let dir = tempdir()?;
    write_sample(&dir.path().join("only"), b"code", b"str\0")?;

    let report = run(dir.path(), 16)?;
    assert_eq!(report.code.total(), 1);
    assert_eq!(report.strings.total(), 1);
    Ok(())
}

#[test]
fn test_counts_match_extracted_regions() -> Result<()> {
    let dir = tempdir()?;
    create_corpus(dir.path())?;
    let report = run(dir.path(), 3)?;

    let extractor = MachOExtractor::new();
    let mut expected_code = std::collections::HashMap::new();
    for batch in ["batch0", "batch1"] {
        for entry in fs::read_dir(dir.path().join(batch))? {
            let path = entry?.path();
            if let Ok(regions) = extractor.extract(&path) {
                if let Some(code) = regions.get(RegionKind::Code) {
                    *expected_code.entry(Digest::of(code)).or_insert(0u64) += 1;
                }
            }
        }
    }

    assert_eq!(report.code.len(), expected_code.len());
    for (digest, count) in expected_code {
        assert_eq!(report.code.count(&digest), count);
    }
    assert_eq!(report.stats.regions_recorded, 16);
    Ok(())
}

#[test]
fn test_repeated_runs_are_identical() -> Result<()> {
    let dir = tempdir()?;
    create_corpus(dir.path())?;

    let first = run(dir.path(), 4)?;
    let second = run(dir.path(), 4)?;

    assert_eq!(first.code.entries(), second.code.entries());
    assert_eq!(first.strings.entries(), second.strings.entries());
    Ok(())
}

#[test]
fn test_empty_directory() -> Result<()> {
    let dir = tempdir()?;
    let coordinator = ShutdownCoordinator::new();
    let mut sink_calls = 0;

    let report = Scanner::new(config(dir.path(), 2)).run(&coordinator, |report| {
        sink_calls += 1;
        assert!(report.code.is_empty());
        Ok(())
    })?;

    assert_eq!(sink_calls, 1);
    assert!(report.code.is_empty());
    assert!(report.strings.is_empty());
    assert_eq!(coordinator.state(), RunState::Terminated);
    Ok(())
}

#[test]
fn test_decoys_contribute_nothing() -> Result<()> {
    let dir = tempdir()?;
    write_text_decoy(&dir.path().join("one"))?;
    write_text_decoy(&dir.path().join("two"))?;

    let report = run(dir.path(), 2)?;
    assert!(report.code.is_empty());
    assert!(report.strings.is_empty());
    assert_eq!(report.stats.files_not_applicable, 2);
    Ok(())
}

#[test]
fn test_ignore_patterns_skip_samples() -> Result<()> {
    let dir = tempdir()?;
    write_sample(&dir.path().join("keep/a"), b"kept", b"k\0")?;
    write_sample(&dir.path().join("quarantine/b"), b"skipped", b"s\0")?;

    let mut cfg = config(dir.path(), 2);
    cfg.ignore_patterns = vec!["**/quarantine/**".to_string()];
    let report = Scanner::new(cfg).run(&ShutdownCoordinator::new(), |_| Ok(()))?;

    assert_eq!(report.code.count(&Digest::of(b"kept")), 1);
    assert_eq!(report.code.count(&Digest::of(b"skipped")), 0);
    assert_eq!(report.stats.candidates, 1);
    Ok(())
}

/// Cancels the token once it has extracted `limit` files
struct CancelAfter {
    inner: MachOExtractor,
    seen: AtomicU64,
    limit: u64,
    token: CancellationToken,
}

impl RegionExtractor for CancelAfter {
    fn extract(&self, path: &Path) -> Result<Regions, ExtractError> {
        let regions = self.inner.extract(path);
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.token.cancel();
        }
        regions
    }
}

#[test]
fn test_interrupt_reports_exactly_the_processed_files() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..10 {
        write_sample(
            &dir.path().join(format!("s{:02}", i)),
            format!("code-{}", i).as_bytes(),
            b"shared strings\0",
        )?;
    }

    let token = CancellationToken::new();
    let coordinator = ShutdownCoordinator::with_token(token.clone());
    let extractor = Arc::new(CancelAfter {
        inner: MachOExtractor::new(),
        seen: AtomicU64::new(0),
        limit: 3,
        token,
    });

    let report = Scanner::new(config(dir.path(), 1))
        .with_extractor(extractor)
        .run(&coordinator, |_| Ok(()))?;

    assert!(report.interrupted);
    assert_eq!(coordinator.state(), RunState::Terminated);
    assert_eq!(report.stats.candidates, 10);
    assert_eq!(report.stats.files_processed, 3);
    assert_eq!(report.code.total(), 3);
    for i in 0..3 {
        assert_eq!(report.code.count(&Digest::of(format!("code-{}", i).as_bytes())), 1);
    }
    assert_eq!(report.strings.count(&Digest::of(b"shared strings\0")), 3);
    Ok(())
}

#[test]
fn test_interrupt_with_workers_drains_cleanly() -> Result<()> {
    let dir = tempdir()?;
    for i in 0..20 {
        write_sample(
            &dir.path().join(format!("s{:02}", i)),
            b"code",
            b"strings\0",
        )?;
    }

    let token = CancellationToken::new();
    let coordinator = ShutdownCoordinator::with_token(token.clone());
    let extractor = Arc::new(CancelAfter {
        inner: MachOExtractor::new(),
        seen: AtomicU64::new(0),
        limit: 5,
        token,
    });

    let report = Scanner::new(config(dir.path(), 4))
        .with_extractor(extractor)
        .run(&coordinator, |_| Ok(()))?;

    assert!(report.interrupted);
    assert_eq!(coordinator.state(), RunState::Terminated);
    let processed = report.stats.files_processed;
    assert!(processed >= 5 && processed < 20);
    assert_eq!(report.code.count(&Digest::of(b"code")), processed);
    assert_eq!(report.strings.count(&Digest::of(b"strings\0")), processed);
    Ok(())
}

#[test]
fn test_cancelled_before_start_reports_empty() -> Result<()> {
    let dir = tempdir()?;
    create_corpus(dir.path())?;

    let coordinator = ShutdownCoordinator::new();
    coordinator.cancel();
    let report = Scanner::new(config(dir.path(), 2)).run(&coordinator, |_| Ok(()))?;

    assert!(report.interrupted);
    assert!(report.code.is_empty());
    assert!(report.strings.is_empty());
    assert_eq!(coordinator.state(), RunState::Terminated);
    Ok(())
}

#[test]
fn test_json_report_shape() -> Result<()> {
    let dir = tempdir()?;
    write_sample(&dir.path().join("a"), b"code", b"strings\0")?;
    write_sample(&dir.path().join("b"), b"code", b"strings\0")?;

    let report = run(dir.path(), 2)?;
    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;

    assert_eq!(json["__text"][0]["digest"], Digest::of(b"code").to_hex());
    assert_eq!(json["__text"][0]["count"], 2);
    assert_eq!(json["__cstring"][0]["count"], 2);
    assert_eq!(json["stats"]["candidates"], 2);
    assert_eq!(json["interrupted"], false);
    Ok(())
}
