use crate::value_parser::{
    CountParser, DefaultValueParser, PercentValueParser, RangeParser, SizeParser,
};

use fillet::bench::Concurrency;
use fillet::hash::HashAlgorithm;
use fillet::sink::Compression;
use fillet::BufferMode;
use fillet::VERSION;

use fillet_opts::CmdLineOptions;

use log::LevelFilter;

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteMode {
    NormalAppend,
    NormalWrite,
    BinaryAppend,
    BinaryWrite,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PumpMode {
    Word,
    Bin1,
    Bin0,
    RandBin,
    RandUtf8,
    RandHex,
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WordMode {
    Fixed,
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DictOrder {
    Sequential,
    Reverse,
    Presorted,
    Random,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NewlineMode {
    None,
    Word,
    Char,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NewlineStyle {
    Lf,
    Cr,
    CrLf,
}

#[derive(CmdLineOptions, Clone, Debug)]
#[optcont(
    delimeters = "=",
    usage = "fillet [options] <path>",
    default_parser = "DefaultValueParser"
)]
pub struct Command {
    #[opt(
        name = "--times",
        env = "FILLET_TIMES",
        desc = "Repeat the token (or chunk) this many times, e.g. 1_000, 1e6, 2^10",
        value_desc = "<count>",
        parser = "CountParser"
    )]
    pub times: Option<u64>,

    #[opt(
        name = "--times-range",
        env = "FILLET_TIMES_RANGE",
        desc = "Repeat a random number of times between MIN and MAX",
        value_desc = "<min>,<max>",
        parser = "RangeParser"
    )]
    pub times_range: Option<(u64, u64)>,

    #[opt(
        name = "--max-times",
        env = "FILLET_MAX_TIMES",
        desc = "Refuse to repeat more often than this (default 10000000)",
        value_desc = "<count>",
        parser = "CountParser"
    )]
    pub max_times: u64,

    #[opt(
        name = "--size",
        env = "FILLET_SIZE",
        desc = "Total bytes to write per target, e.g. 10MiB, 500KB",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub size: Option<u64>,

    #[opt(
        name = "--max-bytes",
        env = "FILLET_MAX_BYTES",
        desc = "Hard stop at this size regardless of other limits",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub max_bytes: Option<u64>,

    #[opt(
        name = "--word",
        env = "FILLET_WORD",
        desc = "Word to write in word mode",
        value_desc = "<text>"
    )]
    pub word: Option<String>,

    #[opt(
        name = "--mode",
        env = "FILLET_MODE",
        desc = "fixed: always the same word, random: random letter case per token",
        value_desc = "fixed|random"
    )]
    pub word_mode: WordMode,

    #[opt(
        name = "--write-mode",
        env = "FILLET_WRITE_MODE",
        desc = "normal-append (default), normal-write, binary-append or binary-write.\n\
                *-write truncates first, binary-* defaults --pump-mode to randbin",
        value_desc = "<mode>"
    )]
    pub write_mode: WriteMode,

    #[opt(
        name = "--pump-mode",
        env = "FILLET_PUMP_MODE",
        desc = "word, bin1 (0xFF), bin0 (0x00), randbin, randutf8, randhex or random",
        value_desc = "<mode>"
    )]
    pub pump_mode: Option<PumpMode>,

    #[opt(
        name = "--dict",
        env = "FILLET_DICT",
        desc = "Newline-separated word list",
        value_desc = "<file>"
    )]
    pub dict: Option<String>,

    #[opt(
        name = "--dict-list",
        env = "FILLET_DICT_LIST",
        desc = "File listing dictionaries, one per line, relative to the list file",
        value_desc = "<file>"
    )]
    pub dict_list: Option<String>,

    #[opt(
        name = "--dict-order",
        env = "FILLET_DICT_ORDER",
        desc = "sequential, reverse, presorted or random (default)",
        value_desc = "<order>"
    )]
    pub dict_order: DictOrder,

    #[flag(
        name = "--dict-ram",
        env = "FILLET_DICT_RAM",
        desc = "Load dictionaries into RAM (allows weights and every order)"
    )]
    pub dict_ram: bool,

    #[flag(
        name = "--markov",
        env = "FILLET_MARKOV",
        desc = "Generate words from an n-gram model of the dictionaries (needs --dict-ram)"
    )]
    pub markov: bool,

    #[opt(
        name = "--ngram",
        env = "FILLET_NGRAM",
        desc = "N of the n-gram model (default 2)",
        value_desc = "<n>"
    )]
    pub ngram: usize,

    #[opt(
        name = "--encoding",
        env = "FILLET_ENCODING",
        desc = "Text encoding label or auto (detect from the first dictionary)",
        value_desc = "<label>"
    )]
    pub encoding: String,

    #[flag(name = "--newline", desc = "Same as --newline-mode=word")]
    pub newline: bool,

    #[opt(
        name = "--newline-mode",
        env = "FILLET_NEWLINE_MODE",
        desc = "Insert a newline after nothing, each word or each character",
        value_desc = "none|word|char"
    )]
    pub newline_mode: Option<NewlineMode>,

    #[opt(
        name = "--newline-style",
        env = "FILLET_NEWLINE_STYLE",
        desc = "Newline bytes to insert",
        value_desc = "lf|cr|crlf"
    )]
    pub newline_style: NewlineStyle,

    #[opt(
        name = "--seed",
        env = "FILLET_SEED",
        desc = "Seed random generators for reproducible output",
        value_desc = "<number>"
    )]
    pub seed: Option<u64>,

    #[opt(
        name = "--chunk",
        env = "FILLET_CHUNK",
        desc = "Chunk size of pattern modes (default 64KiB)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub chunk: u64,

    #[opt(
        name = "--workers",
        env = "FILLET_WORKERS",
        desc = "Writer threads with --concurrency write",
        value_desc = "<n>"
    )]
    pub workers: usize,

    #[opt(
        name = "--gen-workers",
        env = "FILLET_GEN_WORKERS",
        desc = "Generator threads with --concurrency generate",
        value_desc = "<n>"
    )]
    pub gen_workers: usize,

    #[opt(
        name = "--concurrency",
        env = "FILLET_CONCURRENCY",
        desc = "Parallelize writers or generators",
        value_desc = "write|generate"
    )]
    pub concurrency: Concurrency,

    #[opt(
        name = "--queue-size",
        env = "FILLET_QUEUE_SIZE",
        desc = "Capacity of the generator queue (default max(8, 1MiB / chunk))",
        value_desc = "<n>"
    )]
    pub queue_size: Option<usize>,

    #[opt(
        name = "--buffer-mode",
        env = "FILLET_BUFFER_MODE",
        desc = "Accumulate in RAM then dump (default) or stream to the file",
        value_desc = "ram|stream"
    )]
    pub buffer_mode: BufferMode,

    #[opt(
        name = "--compress",
        env = "FILLET_COMPRESS",
        desc = "Compress output; gzip forces a single writer and skips --verify",
        value_desc = "none|gzip"
    )]
    pub compress: Compression,

    #[opt(
        name = "--ram-max",
        env = "FILLET_RAM_MAX",
        desc = "RAM buffer cap; larger runs stream instead (default 256MiB)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub ram_max: u64,

    #[opt(
        name = "--rate",
        env = "FILLET_RATE",
        desc = "Throttle throughput to this many bytes per second",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub rate: Option<u64>,

    #[opt(
        name = "--cpu-limit",
        env = "FILLET_CPU_LIMIT",
        desc = "Approximate CPU ceiling in percent",
        value_desc = "<number>[%]",
        parser = "PercentValueParser"
    )]
    pub cpu_limit: Option<f64>,

    #[opt(
        name = "--ram-limit",
        env = "FILLET_RAM_LIMIT",
        desc = "Abort if resident memory exceeds this size",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub ram_limit: Option<u64>,

    #[flag(
        name = "--fsync-enable",
        env = "FILLET_FSYNC_ENABLE",
        desc = "Flush and fsync every --fsync-interval bytes"
    )]
    pub fsync_enable: bool,

    #[opt(
        name = "--fsync-interval",
        env = "FILLET_FSYNC_INTERVAL",
        desc = "Bytes between fsyncs (default 8MiB)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub fsync_interval: u64,

    #[flag(
        name = "--sparse",
        env = "FILLET_SPARSE",
        desc = "Seek over all-zero chunks instead of writing them"
    )]
    pub sparse: bool,

    #[opt(
        name = "--hash",
        env = "FILLET_HASH",
        desc = "Compute a running hash of the written data",
        value_desc = "sha256|sha512"
    )]
    pub hash: Option<HashAlgorithm>,

    #[flag(
        name = "--verify",
        env = "FILLET_VERIFY",
        desc = "Re-read the written region and compare hashes"
    )]
    pub verify: bool,

    #[opt(
        name = "--io-retries",
        env = "FILLET_IO_RETRIES",
        desc = "Retries of a failed chunk write",
        value_desc = "<n>"
    )]
    pub io_retries: u32,

    #[opt(
        name = "--error-budget",
        env = "FILLET_ERROR_BUDGET",
        desc = "Retries allowed over the whole run (default 10)",
        value_desc = "<n>"
    )]
    pub error_budget: u32,

    #[flag(
        name = "--resume",
        env = "FILLET_RESUME",
        desc = "Continue at the end of an existing file"
    )]
    pub resume: bool,

    #[opt(
        name = "--offset",
        env = "FILLET_OFFSET",
        desc = "Start writing at this byte offset (overrides --resume)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub offset: Option<u64>,

    #[opt(
        name = "--truncate",
        env = "FILLET_TRUNCATE",
        desc = "Truncate the target to this size before writing",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub truncate: Option<u64>,

    #[opt(
        name = "--fallocate",
        env = "FILLET_FALLOCATE",
        desc = "Preallocate this many bytes before writing",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub fallocate: Option<u64>,

    #[flag(
        name = "--disable-disk-guard",
        env = "FILLET_DISABLE_DISK_GUARD",
        desc = "Skip the free space check (may fill the disk)"
    )]
    pub disable_disk_guard: bool,

    #[opt(
        name = "--disk-guard-margin",
        env = "FILLET_DISK_GUARD_MARGIN",
        desc = "Free space to keep beyond the expected output (default 100MiB)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub disk_guard_margin: u64,

    #[opt(
        name = "--filelist",
        env = "FILLET_FILELIST",
        desc = "File listing targets, one per line, relative to the list file",
        value_desc = "<file>"
    )]
    pub filelist: Option<String>,

    #[flag(
        name = "--recursive",
        env = "FILLET_RECURSIVE",
        desc = "Descend into subdirectories when the path is a directory"
    )]
    pub recursive: bool,

    #[flag(
        name = "--progress",
        env = "FILLET_PROGRESS",
        desc = "Show progress on stderr"
    )]
    pub progress: bool,

    #[opt(
        name = "--progress-interval",
        env = "FILLET_PROGRESS_INTERVAL",
        desc = "Progress update interval (default 1s)",
        value_desc = "<number>[unit]"
    )]
    pub progress_interval: Duration,

    #[flag(
        name = "--benchmark",
        desc = "Benchmark chunk sizes, workers and concurrency modes, then print a recommendation"
    )]
    pub benchmark: bool,

    #[opt(
        name = "--bench-size",
        env = "FILLET_BENCH_SIZE",
        desc = "Bytes written by each benchmark trial (default 64MiB)",
        value_desc = "<size>",
        parser = "SizeParser"
    )]
    pub bench_size: u64,

    #[opt(
        name = "--config",
        desc = "JSON or TOML file with option defaults",
        value_desc = "<file>"
    )]
    pub config: Option<String>,

    #[opt(
        name = "--log-level",
        env = "FILLET_LOG_LEVEL",
        desc = "off, error, warn, info (default), debug or trace",
        value_desc = "<level>"
    )]
    pub log_level: LevelFilter,

    #[opt(
        name = "--log-file",
        env = "FILLET_LOG_FILE",
        desc = "Append log records to this file instead of stderr",
        value_desc = "<file>"
    )]
    pub log_file: Option<String>,

    #[flag(names("-j", "--json"), env = "FILLET_JSON", desc = "Print the report as JSON")]
    pub use_json: bool,

    #[flag(name = "--debug", env = "FILLET_DEBUG", desc = "Print call stacks of errors")]
    pub debug: bool,

    #[flag(names("-V", "--version"), desc = "Print version and exit")]
    pub version: bool,

    #[flag(names("-h", "--help"), desc = "Print this help and exit")]
    pub help: bool,

    pub path: Option<String>,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            times: None,
            times_range: None,
            max_times: 10_000_000,
            size: None,
            max_bytes: None,
            word: None,
            word_mode: WordMode::Fixed,
            write_mode: WriteMode::NormalAppend,
            pump_mode: None,
            dict: None,
            dict_list: None,
            dict_order: DictOrder::Random,
            dict_ram: false,
            markov: false,
            ngram: 2,
            encoding: String::from("utf-8"),
            newline: false,
            newline_mode: None,
            newline_style: NewlineStyle::Lf,
            seed: None,
            chunk: 64 * 1024,
            workers: 1,
            gen_workers: 1,
            concurrency: Concurrency::Write,
            queue_size: None,
            buffer_mode: BufferMode::Ram,
            compress: Compression::None,
            ram_max: 256 * 1024 * 1024,
            rate: None,
            cpu_limit: None,
            ram_limit: None,
            fsync_enable: false,
            fsync_interval: 8 * 1024 * 1024,
            sparse: false,
            hash: None,
            verify: false,
            io_retries: 0,
            error_budget: 10,
            resume: false,
            offset: None,
            truncate: None,
            fallocate: None,
            disable_disk_guard: false,
            disk_guard_margin: 100 * 1024 * 1024,
            filelist: None,
            recursive: false,
            progress: false,
            progress_interval: Duration::from_secs(1),
            benchmark: false,
            bench_size: 64 * 1024 * 1024,
            config: None,
            log_level: LevelFilter::Info,
            log_file: None,
            use_json: false,
            debug: false,
            version: false,
            help: false,
            path: None,
        }
    }
}

impl Command {
    pub fn from_env() -> Result<Self, String> {
        let mut cmd = Self::default();
        cmd.parse_env()?;
        Ok(cmd)
    }

    pub fn print_help() {
        let mut help = Self::help();
        help.overview = Some(format!(
            "fillet v{}\nCreate or grow files from words, dictionaries or byte patterns",
            VERSION
        ));
        println!("{}", help);
        println!("Write modes:");
        for (mode, desc) in [
            ("normal-append", "Append text tokens; pump mode defaults to word"),
            ("normal-write", "Truncate, then write text tokens"),
            ("binary-append", "Append binary chunks; pump mode defaults to randbin"),
            ("binary-write", "Truncate, then write binary chunks"),
        ]
        .iter()
        {
            println!("  {:16}{}", mode, desc);
        }
        println!();
    }

    pub fn pump_mode(&self) -> PumpMode {
        self.pump_mode.unwrap_or(match self.write_mode {
            WriteMode::BinaryAppend | WriteMode::BinaryWrite => PumpMode::RandBin,
            WriteMode::NormalAppend | WriteMode::NormalWrite => PumpMode::Word,
        })
    }

    pub fn newline_mode(&self) -> NewlineMode {
        match self.newline_mode {
            Some(mode) => mode,
            None if self.newline => NewlineMode::Word,
            None => NewlineMode::None,
        }
    }

    pub fn truncates(&self) -> bool {
        match self.write_mode {
            WriteMode::NormalWrite | WriteMode::BinaryWrite => true,
            WriteMode::NormalAppend | WriteMode::BinaryAppend => false,
        }
    }

    /// Every option name accepted on the command line.
    pub fn option_names() -> Vec<String> {
        Self::help()
            .options
            .into_iter()
            .flat_map(|o| o.names.into_iter())
            .collect()
    }
}

impl PumpMode {
    pub fn is_pattern(self) -> bool {
        self != PumpMode::Word
    }
}

impl NewlineStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            NewlineStyle::Lf => "\n",
            NewlineStyle::Cr => "\r",
            NewlineStyle::CrLf => "\r\n",
        }
    }
}

impl Display for PumpMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            PumpMode::Word => "word",
            PumpMode::Bin1 => "bin1",
            PumpMode::Bin0 => "bin0",
            PumpMode::RandBin => "randbin",
            PumpMode::RandUtf8 => "randutf8",
            PumpMode::RandHex => "randhex",
            PumpMode::Random => "random",
        })
    }
}

impl Display for WriteMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            WriteMode::NormalAppend => "normal-append",
            WriteMode::NormalWrite => "normal-write",
            WriteMode::BinaryAppend => "binary-append",
            WriteMode::BinaryWrite => "binary-write",
        })
    }
}
