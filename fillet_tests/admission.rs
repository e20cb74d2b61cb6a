use crate::common::{FakeMetrics, FakeProbe, TmpDir};

use fillet::admission::AdmissionController;
use fillet::source::RepeatSource;
use fillet::{Bound, ChunkSource, ErrorKind, Pump, PumpOptions, WriteTarget};

use std::path::PathBuf;

fn target(tmp: &TmpDir, name: &str) -> WriteTarget {
    WriteTarget::Path(PathBuf::from(tmp.file(name)))
}

#[test]
fn passes_iff_demand_plus_margin_fits() {
    let tmp = TmpDir::new();
    let probe = FakeProbe::new(1000);
    let t = target(&tmp, "a.bin");
    for &(need, margin, ok) in &[
        (900u64, 100u64, true),
        (901, 100, false),
        (0, 1000, true),
        (0, 1001, false),
        (1000, 0, true),
    ] {
        let guard = AdmissionController::new(&probe, margin, true);
        let result = guard.check_all(&[(t.clone(), Some(need))]);
        assert_eq!(result.is_ok(), ok, "need {} margin {}", need, margin);
        assert_eq!(guard.check_target(&t, Some(need)).is_ok(), ok);
    }
}

#[test]
fn shared_device_sums_demand() {
    let tmp = TmpDir::new();
    let probe = FakeProbe::new(1000);
    let guard = AdmissionController::new(&probe, 0, true);
    let (a, b) = (target(&tmp, "a.bin"), target(&tmp, "b.bin"));

    assert!(guard.check_target(&a, Some(600)).is_ok());
    assert!(guard.check_target(&b, Some(600)).is_ok());

    let err = guard
        .check_all(&[(a, Some(600)), (b, Some(600))])
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
    match err.kind() {
        ErrorKind::SpaceExhausted {
            group,
            required,
            free,
            ..
        } => {
            assert_eq!(group, "disk0");
            assert_eq!(*required, 1200);
            assert_eq!(*free, 1000);
        }
        _ => unreachable!(),
    }
}

#[test]
fn unknown_demand_and_stdout_are_skipped() {
    let tmp = TmpDir::new();
    let probe = FakeProbe::new(0);
    let guard = AdmissionController::new(&probe, 10, true);
    assert!(guard
        .check_all(&[(target(&tmp, "a.bin"), None), (WriteTarget::Stdout, Some(1 << 30))])
        .is_ok());
    assert!(guard.check_target(&WriteTarget::Stdout, Some(1)).is_ok());
}

#[test]
fn disabled_guard_always_passes() {
    let tmp = TmpDir::new();
    let probe = FakeProbe::new(0);
    let guard = AdmissionController::new(&probe, 1 << 40, false);
    assert!(guard.check_all(&[(target(&tmp, "a.bin"), Some(1 << 40))]).is_ok());
    assert!(guard.check_target(&target(&tmp, "a.bin"), Some(1 << 40)).is_ok());
}

#[test]
fn probe_failures_degrade_to_pass() {
    let tmp = TmpDir::new();
    let probe = FakeProbe {
        group: None,
        free: None,
    };
    let guard = AdmissionController::new(&probe, 1 << 40, true);
    assert!(guard.check_all(&[(target(&tmp, "a.bin"), Some(1 << 40))]).is_ok());
}

#[test]
fn missing_directories_are_probed_through_ancestors() {
    let tmp = TmpDir::new();
    let probe = FakeProbe::new(100);
    let guard = AdmissionController::new(&probe, 0, true);
    let deep = WriteTarget::Path(PathBuf::from(tmp.file("x/y/z/out.bin")));
    assert!(guard.check_all(&[(deep.clone(), Some(100))]).is_ok());
    assert!(guard.check_all(&[(deep, Some(101))]).is_err());
}

#[test]
fn pump_aborts_before_writing_anything() {
    let tmp = TmpDir::new();
    let metrics = FakeMetrics::new();
    let probe = FakeProbe::new(1 << 20);
    let targets = vec![target(&tmp, "a.bin"), target(&tmp, "b.bin")];
    let opts = PumpOptions {
        bound: Bound::Size(1024),
        expected_bytes: Some(1024),
        disk_margin: 1 << 20,
        ..PumpOptions::default()
    };

    let mut sources = 0;
    let err = Pump::new(&opts, &metrics, &probe)
        .run(&targets, || {
            sources += 1;
            let source: Box<dyn ChunkSource> = Box::new(RepeatSource::new(vec![1u8; 100]));
            Ok(source)
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert_eq!(sources, 0);
    assert!(!tmp.path().join("a.bin").exists());
    assert!(!tmp.path().join("b.bin").exists());

    let opts = PumpOptions {
        disk_guard: false,
        ..opts
    };
    let reports = Pump::new(&opts, &metrics, &probe)
        .run(&targets, || {
            let source: Box<dyn ChunkSource> = Box::new(RepeatSource::new(vec![1u8; 100]));
            Ok(source)
        })
        .unwrap();
    assert_eq!(reports.len(), 2);
    for r in &reports {
        assert_eq!(r.outcome.written, 1024);
    }
    assert_eq!(std::fs::metadata(tmp.file("a.bin")).unwrap().len(), 1024);
    assert_eq!(std::fs::metadata(tmp.file("b.bin")).unwrap().len(), 1024);
}
