use crate::common::{argv, read_bytes, write_all, TmpDir};

use fillet::{Strategy, WriteTarget};

use fillet_driver::{parse_command, run, Report, ReportBody};

use flate2::read::GzDecoder;

use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

fn pump(args: &[&str]) -> fillet::Result<Report> {
    let mut args = argv(args);
    args.push(String::from("--log-level=error"));
    Ok(run(args)?.unwrap())
}

fn strategies(report: &Report) -> Vec<Strategy> {
    match report.body {
        ReportBody::Pump { ref targets, .. } => targets.iter().map(|t| t.strategy).collect(),
        ReportBody::Benchmark(_) => Vec::new(),
    }
}

#[test]
fn words_with_newlines() {
    let tmp = TmpDir::new();
    let out = tmp.file("words.txt");
    let report = pump(&[
        "--word=ab",
        "--times=3",
        "--newline-mode=word",
        "--disable-disk-guard",
        &out,
    ])
    .unwrap();
    assert_eq!(read_bytes(&out), b"ab\nab\nab\n".to_vec());
    assert_eq!(report.total_written(), 9);
    assert_eq!(strategies(&report), vec![Strategy::RamBuffer]);
}

#[test]
fn append_and_write_modes() {
    let tmp = TmpDir::new();
    let out = tmp.file("modes.txt");
    for _ in 0..2 {
        pump(&["--word=x", "--times=2", "--disable-disk-guard", &out]).unwrap();
    }
    assert_eq!(read_bytes(&out), b"xxxx".to_vec());

    pump(&[
        "--word=y",
        "--times=1",
        "--write-mode=normal-write",
        "--disable-disk-guard",
        &out,
    ])
    .unwrap();
    assert_eq!(read_bytes(&out), b"y".to_vec());

    pump(&[
        "--word=z",
        "--times=2",
        "--write-mode=normal-write",
        "--resume",
        "--disable-disk-guard",
        &out,
    ])
    .unwrap();
    assert_eq!(read_bytes(&out), b"yzz".to_vec());
}

#[test]
fn offset_and_truncate() {
    let tmp = TmpDir::new();
    let out = tmp.file("patched.txt");
    write_all(&out, "..........");
    pump(&["--word=ab", "--times=2", "--offset=2", "--disable-disk-guard", &out]).unwrap();
    assert_eq!(read_bytes(&out), b"..abab....".to_vec());

    pump(&["--word=q", "--times=3", "--truncate=4", "--disable-disk-guard", &out]).unwrap();
    assert_eq!(read_bytes(&out), b"..abqqq".to_vec());
}

#[test]
fn binary_size_is_exact_for_every_strategy() {
    let tmp = TmpDir::new();
    let cases: Vec<(&str, Vec<&str>, Strategy)> = vec![
        ("ram.bin", vec![], Strategy::RamBuffer),
        ("stream.bin", vec!["--buffer-mode=stream"], Strategy::Stream),
        (
            "concurrent.bin",
            vec!["--buffer-mode=stream", "--workers=3"],
            Strategy::Concurrent(3),
        ),
        (
            "pipeline.bin",
            vec!["--buffer-mode=stream", "--concurrency=generate", "--gen-workers=2"],
            Strategy::Pipeline(2),
        ),
        ("fallback.bin", vec!["--ram-max=4KiB"], Strategy::Stream),
    ];
    for (name, extra, strategy) in cases {
        let out = tmp.file(name);
        let mut args = vec![
            "--write-mode=binary-write",
            "--pump-mode=bin1",
            "--size=10KiB",
            "--chunk=4KiB",
            "--disable-disk-guard",
        ];
        args.extend(extra);
        args.push(&out);
        let report = pump(&args).unwrap();
        assert_eq!(strategies(&report), vec![strategy], "{}", name);
        assert_eq!(read_bytes(&out), vec![0xFF; 10 * 1024], "{}", name);
    }
}

#[test]
fn hash_verify_and_json_report() {
    let tmp = TmpDir::new();
    let out = tmp.file("hashed.bin");
    let report = pump(&[
        "--pump-mode=randhex",
        "--chunk=100",
        "--times=7",
        "--hash=sha256",
        "--verify",
        "--buffer-mode=stream",
        "--disable-disk-guard",
        "--json",
        &out,
    ])
    .unwrap();
    assert!(report.kind.is_json());

    let value = report.to_json();
    assert_eq!(value["TotalBytesWritten"].as_u64(), Some(700));
    let target = &value["Targets"][0];
    assert_eq!(target["Target"].as_str(), Some(out.as_str()));
    assert_eq!(target["Strategy"].as_str(), Some("stream"));
    assert_eq!(target["Chunks"].as_u64(), Some(7));
    assert_eq!(target["Digest"].as_str().map(str::len), Some(64));
    assert_eq!(fs::metadata(&out).unwrap().len(), 700);
}

#[test]
fn gzip_output_decompresses_to_full_size() {
    let tmp = TmpDir::new();
    let cases: Vec<(&str, Vec<&str>, Strategy)> = vec![
        ("ram.gz", vec![], Strategy::RamBuffer),
        (
            "stream.gz",
            vec!["--buffer-mode=stream", "--workers=3", "--fsync-enable", "--fsync-interval=1KiB"],
            Strategy::Stream,
        ),
    ];
    for (name, extra, strategy) in cases {
        let out = tmp.file(name);
        let mut args = vec![
            "--word=abc",
            "--times=5000",
            "--compress=gzip",
            "--hash=sha256",
            "--verify",
            "--disable-disk-guard",
        ];
        args.extend(extra);
        args.push(&out);
        let report = pump(&args).unwrap();
        assert_eq!(strategies(&report), vec![strategy], "{}", name);

        let compressed = read_bytes(&out);
        assert!(compressed.len() < 15_000, "{}", name);
        let mut plain = Vec::new();
        GzDecoder::new(&compressed[..])
            .read_to_end(&mut plain)
            .unwrap();
        assert_eq!(plain.len(), 15_000, "{}", name);
        assert!(plain.chunks(3).all(|w| w == b"abc"), "{}", name);
    }
}

#[test]
fn size_cap_clips_fixed_words() {
    let tmp = TmpDir::new();
    let out = tmp.file("capped.txt");
    let report = pump(&[
        "--word=abcd",
        "--times=100",
        "--max-bytes=10",
        "--disable-disk-guard",
        &out,
    ])
    .unwrap();
    assert_eq!(report.total_written(), 10);
    assert_eq!(read_bytes(&out), b"abcdabcdab".to_vec());
}

#[test]
fn times_range_is_seeded() {
    let tmp = TmpDir::new();
    let out = tmp.file("range.txt");
    let report = pump(&[
        "--word=w",
        "--times-range=5,9",
        "--seed=11",
        "--disable-disk-guard",
        &out,
    ])
    .unwrap();
    let written = report.total_written();
    assert!(written >= 5 && written <= 9);
}

#[test]
fn directory_targets() {
    let tmp = TmpDir::new();
    let dir = tmp.file("targets");
    fs::create_dir_all(format!("{}/nested", dir)).unwrap();
    write_all(format!("{}/b.bin", dir), "");
    write_all(format!("{}/a.bin", dir), "");
    write_all(format!("{}/nested/c.bin", dir), "");

    let report = pump(&[
        "--write-mode=binary-write",
        "--pump-mode=bin0",
        "--size=1KiB",
        "--disable-disk-guard",
        &dir,
    ])
    .unwrap();
    match report.body {
        ReportBody::Pump { ref targets, .. } => {
            let names: Vec<WriteTarget> = targets.iter().map(|t| t.target.clone()).collect();
            assert_eq!(
                names,
                vec![
                    WriteTarget::Path(PathBuf::from(format!("{}/a.bin", dir))),
                    WriteTarget::Path(PathBuf::from(format!("{}/b.bin", dir))),
                ]
            );
        }
        ReportBody::Benchmark(_) => unreachable!(),
    }
    assert_eq!(read_bytes(format!("{}/a.bin", dir)).len(), 1024);
    assert_eq!(read_bytes(format!("{}/nested/c.bin", dir)).len(), 0);

    let report = pump(&[
        "--write-mode=binary-write",
        "--pump-mode=bin0",
        "--size=1KiB",
        "--recursive",
        "--disable-disk-guard",
        &dir,
    ])
    .unwrap();
    assert_eq!(report.total_written(), 3 * 1024);
}

#[test]
fn disk_guard_aborts_before_writing() {
    let tmp = TmpDir::new();
    let dir = tmp.file("guarded");
    fs::create_dir(&dir).unwrap();
    write_all(format!("{}/one.bin", dir), "");
    write_all(format!("{}/two.bin", dir), "");

    let err = pump(&[
        "--write-mode=binary-write",
        "--size=1KiB",
        "--disk-guard-margin=1000000TB",
        &dir,
    ])
    .err()
    .unwrap();
    assert_eq!(err.exit_code(), 3);
    assert_eq!(read_bytes(format!("{}/one.bin", dir)).len(), 0);
    assert_eq!(read_bytes(format!("{}/two.bin", dir)).len(), 0);

    pump(&[
        "--write-mode=binary-write",
        "--size=1KiB",
        "--disk-guard-margin=1000000TB",
        "--disable-disk-guard",
        &dir,
    ])
    .unwrap();
    assert_eq!(read_bytes(format!("{}/one.bin", dir)).len(), 1024);
    assert_eq!(read_bytes(format!("{}/two.bin", dir)).len(), 1024);
}

#[test]
fn filelist_targets() {
    let tmp = TmpDir::new();
    let list = tmp.file("targets.lst");
    write_all(&list, "# outputs\nfirst.txt\nsub/second.txt\n");

    let report = pump(&[
        "--word=k",
        "--times=4",
        "--filelist",
        &list,
        "--disable-disk-guard",
    ])
    .unwrap();
    assert_eq!(report.total_written(), 8);
    assert_eq!(read_bytes(tmp.file("first.txt")), b"kkkk".to_vec());
    assert_eq!(read_bytes(tmp.file("sub/second.txt")), b"kkkk".to_vec());
}

#[test]
fn toml_config_under_argv() {
    let tmp = TmpDir::new();
    let config = tmp.file("fillet.toml");
    write_all(
        &config,
        "word = \"cfg\"\ntimes = 5\nnewline_mode = \"word\"\nsparse = false\nverify = true\n\
         unknown_key = 1\n",
    );
    let cmd = parse_command(&argv(&["--config", &config, "--times=2", "out.txt"])).unwrap();
    assert_eq!(cmd.word, Some(String::from("cfg")));
    assert_eq!(cmd.times, Some(2));
    assert!(cmd.verify);
    assert!(!cmd.sparse);
    assert_eq!(cmd.path, Some(String::from("out.txt")));
}

#[test]
fn json_config() {
    let tmp = TmpDir::new();
    let config = tmp.file("fillet.json");
    write_all(
        &config,
        r#"{"pump-mode": "bin0", "size": "2KiB", "workers": 4, "progress": true, "seed": null}"#,
    );
    let cmd = parse_command(&argv(&[&format!("--config={}", config), "x.bin"])).unwrap();
    assert_eq!(cmd.size, Some(2048));
    assert_eq!(cmd.workers, 4);
    assert!(cmd.progress);
    assert_eq!(cmd.seed, None);

    write_all(&config, r#"{"times": {"nested": 1}}"#);
    let err = parse_command(&argv(&["--config", &config, "x.bin"])).unwrap_err();
    assert_eq!(err.exit_code(), 2);

    let yaml = tmp.file("fillet.yaml");
    write_all(&yaml, "times: 1\n");
    let err = parse_command(&argv(&["--config", &yaml, "x.bin"])).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn env_under_argv() {
    env::set_var("FILLET_QUEUE_SIZE", "5");
    let cmd = parse_command(&argv(&["x.bin"])).unwrap();
    assert_eq!(cmd.queue_size, Some(5));
    let cmd = parse_command(&argv(&["--queue-size=6", "x.bin"])).unwrap();
    assert_eq!(cmd.queue_size, Some(6));
    env::remove_var("FILLET_QUEUE_SIZE");
}

#[test]
fn usage_errors() {
    assert_eq!(pump(&["--word=a", "--times=1"]).err().unwrap().exit_code(), 2);
    assert_eq!(pump(&["--word=a", "x.txt"]).err().unwrap().exit_code(), 2);
    assert_eq!(
        pump(&["--word=a", "--times=11", "--max-times=10", "x.txt"])
            .err()
            .unwrap()
            .exit_code(),
        2
    );
    assert_eq!(pump(&["--bogus", "x.txt"]).err().unwrap().exit_code(), 2);
    assert_eq!(
        pump(&["--dict=missing.txt", "--dict-ram", "--times=1", "x.txt"])
            .err()
            .unwrap()
            .exit_code(),
        1
    );
}

#[test]
fn help_and_version() {
    assert!(run(&["--help"]).unwrap().is_none());
    assert!(run(&["-V"]).unwrap().is_none());
    assert!(run(Vec::<String>::new()).unwrap().is_none());
}
