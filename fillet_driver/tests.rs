use crate::cmd::*;
use crate::driver::{bound, open_mode, resolve_times};
use crate::value_parser::{parse_count, parse_size, parse_time_value};
use crate::{parse_command, Driver};

use fillet::bench::Concurrency;
use fillet::hash::HashAlgorithm;
use fillet::sink::{Compression, OpenMode};
use fillet::{Bound, BufferMode, ErrorKind, Strategy, WriteTarget};

use fillet_opts::CmdLineOptions;

use log::LevelFilter;

use rand::rngs::StdRng;
use rand::SeedableRng;

use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

macro_rules! check_opt {
    ($argv:expr, $field:ident, $value:expr) => {{
        let mut cmd = Command::default();
        let _ = cmd.parse_argv($argv);
        assert_eq!(cmd.$field, $value);
    }};
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn parse_opt_delimeters() {
    check_opt!(&["--size=10MiB"], size, Some(10 * MIB));
    check_opt!(&["--size", "10MiB"], size, Some(10 * MIB));
    check_opt!(&["--word=a=b"], word, Some(String::from("a=b")));
}

#[test]
fn parse_basic_opts() {
    check_opt!(&["--times=5"], times, Some(5));
    check_opt!(&["--times-range=1,10"], times_range, Some((1, 10)));
    check_opt!(&["--max-times=2^20"], max_times, 1 << 20);
    check_opt!(&["--max-bytes=1KB"], max_bytes, Some(1000));
    check_opt!(&["--word=hello"], word, Some(String::from("hello")));
    check_opt!(&["--mode=random"], word_mode, WordMode::Random);
    check_opt!(&["--write-mode=binary-write"], write_mode, WriteMode::BinaryWrite);
    check_opt!(&["--pump-mode=randhex"], pump_mode, Some(PumpMode::RandHex));
    check_opt!(&["--dict=words.txt"], dict, Some(String::from("words.txt")));
    check_opt!(&["--dict-order=presorted"], dict_order, DictOrder::Presorted);
    check_opt!(&["--dict-ram"], dict_ram, true);
    check_opt!(&["--markov"], markov, true);
    check_opt!(&["--ngram=3"], ngram, 3);
    check_opt!(&["--encoding=latin1"], encoding, String::from("latin1"));
    check_opt!(&["--newline-mode=char"], newline_mode, Some(NewlineMode::Char));
    check_opt!(&["--newline-style=crlf"], newline_style, NewlineStyle::CrLf);
    check_opt!(&["--seed=42"], seed, Some(42));
    check_opt!(&["--chunk=4KiB"], chunk, 4 * KIB);
    check_opt!(&["--workers=4"], workers, 4);
    check_opt!(&["--gen-workers=3"], gen_workers, 3);
    check_opt!(&["--concurrency=generate"], concurrency, Concurrency::Generate);
    check_opt!(&["--queue-size=2"], queue_size, Some(2));
    check_opt!(&["--buffer-mode=stream"], buffer_mode, BufferMode::Stream);
    check_opt!(&["--compress=gzip"], compress, Compression::Gzip);
    check_opt!(&["--ram-max=1GiB"], ram_max, 1024 * MIB);
    check_opt!(&["--rate=10MiB"], rate, Some(10 * MIB));
    check_opt!(&["--cpu-limit=50%"], cpu_limit, Some(50.0));
    check_opt!(&["--ram-limit=512MiB"], ram_limit, Some(512 * MIB));
    check_opt!(&["--fsync-enable"], fsync_enable, true);
    check_opt!(&["--fsync-interval=1MiB"], fsync_interval, MIB);
    check_opt!(&["--sparse"], sparse, true);
    check_opt!(&["--hash=sha512"], hash, Some(HashAlgorithm::Sha512));
    check_opt!(&["--verify"], verify, true);
    check_opt!(&["--io-retries=3"], io_retries, 3);
    check_opt!(&["--error-budget=0"], error_budget, 0);
    check_opt!(&["--resume"], resume, true);
    check_opt!(&["--offset=100"], offset, Some(100));
    check_opt!(&["--truncate=0"], truncate, Some(0));
    check_opt!(&["--fallocate=1MiB"], fallocate, Some(MIB));
    check_opt!(&["--disable-disk-guard"], disable_disk_guard, true);
    check_opt!(&["--disk-guard-margin=0"], disk_guard_margin, 0);
    check_opt!(&["--filelist=list.txt"], filelist, Some(String::from("list.txt")));
    check_opt!(&["--recursive"], recursive, true);
    check_opt!(&["--progress"], progress, true);
    check_opt!(&["--progress-interval=250ms"], progress_interval, Duration::from_millis(250));
    check_opt!(&["--benchmark"], benchmark, true);
    check_opt!(&["--bench-size=8MiB"], bench_size, 8 * MIB);
    check_opt!(&["--log-level=debug"], log_level, LevelFilter::Debug);
    check_opt!(&["--log-level=WARNING"], log_level, LevelFilter::Warn);
    check_opt!(&["-j"], use_json, true);
    check_opt!(&["--json"], use_json, true);
    check_opt!(&["-V"], version, true);
    check_opt!(&["--debug"], debug, true);
}

#[test]
fn parse_invalid_values() {
    let mut cmd = Command::default();
    assert!(cmd.parse_argv(&["--size=10XB"]).is_err());
    assert!(cmd.parse_argv(&["--times=abc"]).is_err());
    assert!(cmd.parse_argv(&["--times-range=10,1"]).is_err());
    assert!(cmd.parse_argv(&["--pump-mode=zeros"]).is_err());
    assert!(cmd.parse_argv(&["--hash=md5"]).is_err());
    assert!(cmd.parse_argv(&["--compress=zstd"]).is_err());
    assert!(cmd.parse_argv(&["--sparse=1"]).is_err());
    assert!(cmd.parse_argv(&["--size"]).is_err());
}

#[test]
fn parse_stops_at_positional() {
    let mut cmd = Command::default();
    assert_eq!(cmd.parse_argv(&["--times", "3", "out.txt", "--size=1"]), Ok(2));
    assert_eq!(cmd.times, Some(3));
    assert_eq!(cmd.size, None);
}

#[test]
fn options_after_path() {
    let cmd = parse_command(&argv(&["--word=x", "out.txt", "--times=7"])).unwrap();
    assert_eq!(cmd.path, Some(String::from("out.txt")));
    assert_eq!(cmd.times, Some(7));

    let err = parse_command(&argv(&["out.txt", "--bogus"])).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    let err = parse_command(&argv(&["a.txt", "b.txt"])).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn size_units() {
    assert_eq!(parse_size("100"), Ok(100));
    assert_eq!(parse_size("100B"), Ok(100));
    assert_eq!(parse_size("1KB"), Ok(1000));
    assert_eq!(parse_size("1kib"), Ok(1024));
    assert_eq!(parse_size("1.5KiB"), Ok(1536));
    assert_eq!(parse_size("2MB"), Ok(2_000_000));
    assert_eq!(parse_size("1GiB"), Ok(1 << 30));
    assert_eq!(parse_size("1TB"), Ok(1_000_000_000_000));
    assert!(parse_size("KiB").is_err());
    assert!(parse_size("1PiB").is_err());
}

#[test]
fn count_notations() {
    assert_eq!(parse_count("1000"), Ok(1000));
    assert_eq!(parse_count("1_000_000"), Ok(1_000_000));
    assert_eq!(parse_count("1e6"), Ok(1_000_000));
    assert_eq!(parse_count("2^10"), Ok(1024));
    assert_eq!(parse_count("2.5e3"), Ok(2500));
    assert!(parse_count("2^100").is_err());
    assert!(parse_count("-1").is_err());
}

#[test]
fn time_values() {
    assert_eq!(parse_time_value("1"), Ok(Duration::from_secs(1)));
    assert_eq!(parse_time_value("0.5s"), Ok(Duration::from_millis(500)));
    assert_eq!(parse_time_value("20ms"), Ok(Duration::from_millis(20)));
    assert_eq!(parse_time_value("2m"), Ok(Duration::from_secs(120)));
    assert!(parse_time_value("fast").is_err());
}

#[test]
fn write_mode_defaults() {
    let mut cmd = Command::default();
    assert_eq!(cmd.pump_mode(), PumpMode::Word);
    assert_eq!(open_mode(&cmd), OpenMode::Append);

    cmd.write_mode = WriteMode::BinaryWrite;
    assert_eq!(cmd.pump_mode(), PumpMode::RandBin);
    assert_eq!(open_mode(&cmd), OpenMode::Truncate);

    cmd.pump_mode = Some(PumpMode::Bin0);
    assert_eq!(cmd.pump_mode(), PumpMode::Bin0);

    cmd.resume = true;
    assert_eq!(open_mode(&cmd), OpenMode::Append);
    cmd.offset = Some(10);
    assert_eq!(open_mode(&cmd), OpenMode::At(10));
}

#[test]
fn legacy_newline_flag() {
    let mut cmd = Command::default();
    assert_eq!(cmd.newline_mode(), NewlineMode::None);
    cmd.newline = true;
    assert_eq!(cmd.newline_mode(), NewlineMode::Word);
    cmd.newline_mode = Some(NewlineMode::Char);
    assert_eq!(cmd.newline_mode(), NewlineMode::Char);
}

#[test]
fn times_resolution() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut cmd = Command::default();
    assert_eq!(resolve_times(&cmd, &mut rng).unwrap(), None);

    cmd.times = Some(5);
    assert_eq!(resolve_times(&cmd, &mut rng).unwrap(), Some(5));

    cmd.times_range = Some((3, 6));
    for _ in 0..20 {
        let n = resolve_times(&cmd, &mut rng).unwrap().unwrap();
        assert!(n >= 3 && n <= 6);
    }

    cmd.times_range = None;
    cmd.times = Some(11);
    cmd.max_times = 10;
    let err = resolve_times(&cmd, &mut rng).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn bound_selection() {
    assert_eq!(
        bound(Some(3), None).unwrap(),
        Bound::Count {
            count: 3,
            size_cap: None
        }
    );
    assert_eq!(
        bound(Some(3), Some(10)).unwrap(),
        Bound::Count {
            count: 3,
            size_cap: Some(10)
        }
    );
    assert_eq!(bound(None, Some(10)).unwrap(), Bound::Size(10));
    match bound(None, None).unwrap_err().kind() {
        ErrorKind::Config(_) => {}
        _ => unreachable!(),
    }
}

#[test]
fn expected_bytes_of_fixed_word() {
    let cmd = parse_command(&argv(&[
        "--word=abc",
        "--newline-mode=word",
        "--newline-style=crlf",
        "--times=10",
        "out.txt",
    ]))
    .unwrap();
    let driver = Driver::from_cmd(&cmd).unwrap();
    assert_eq!(driver.options().expected_bytes, Some(50));
    assert_eq!(driver.options().strategy(), Strategy::RamBuffer);
    assert_eq!(
        driver.targets(),
        &[WriteTarget::Path("out.txt".into())][..]
    );
}

#[test]
fn expected_bytes_of_patterns() {
    let cmd = parse_command(&argv(&[
        "--pump-mode=bin1",
        "--chunk=1KiB",
        "--times=4",
        "--ram-max=2KiB",
        "--concurrency=generate",
        "--gen-workers=2",
        "-",
    ]))
    .unwrap();
    let driver = Driver::from_cmd(&cmd).unwrap();
    assert_eq!(driver.options().expected_bytes, Some(4 * KIB));
    assert_eq!(driver.options().strategy(), Strategy::Pipeline(2));
    assert_eq!(driver.targets(), &[WriteTarget::Stdout][..]);
}

#[test]
fn compression_forces_single_writer() {
    let cmd = parse_command(&argv(&[
        "--word=abc",
        "--times=10",
        "--buffer-mode=stream",
        "--workers=4",
        "--compress=gzip",
        "out.gz",
    ]))
    .unwrap();
    let driver = Driver::from_cmd(&cmd).unwrap();
    assert_eq!(driver.options().compress, Compression::Gzip);
    assert_eq!(driver.options().strategy(), Strategy::Stream);

    let cmd = parse_command(&argv(&[
        "--word=abc",
        "--times=10",
        "--buffer-mode=stream",
        "--workers=4",
        "out.txt",
    ]))
    .unwrap();
    let driver = Driver::from_cmd(&cmd).unwrap();
    assert_eq!(driver.options().strategy(), Strategy::Concurrent(4));
}

#[test]
fn expected_bytes_unknown_for_random_case() {
    let cmd = parse_command(&argv(&["--word=abc", "--mode=random", "--times=3", "x"])).unwrap();
    let driver = Driver::from_cmd(&cmd).unwrap();
    assert_eq!(driver.options().expected_bytes, None);
}

#[test]
fn word_required_without_dict() {
    let cmd = parse_command(&argv(&["--times=3", "out.txt"])).unwrap();
    let err = Driver::from_cmd(&cmd).err().unwrap();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn unknown_encoding() {
    let cmd = parse_command(&argv(&["--word=a", "--times=1", "--encoding=klingon", "x"])).unwrap();
    let err = Driver::from_cmd(&cmd).err().unwrap();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn help_lists_env_vars() {
    let help = Command::help().to_string();
    assert!(help.contains("--ram-max=<size>"));
    assert!(help.contains("FILLET_RAM_MAX"));
    assert!(help.contains("Environment variables:"));
}
