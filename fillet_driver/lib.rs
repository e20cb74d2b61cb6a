extern crate chardet;
extern crate encoding;
extern crate env_logger;
extern crate fillet;
extern crate fillet_opts;
extern crate hex;
extern crate json;
extern crate log;
extern crate rand;
extern crate toml;

mod cmd;
mod config;
mod driver;
mod logging;
mod misc;
mod report;
mod value_parser;

pub mod generators;
pub mod targets;

#[cfg(test)]
mod tests;

pub use crate::cmd::*;
pub use crate::driver::Driver;
pub use crate::report::*;

use fillet::admission::FsProbe;
use fillet::metrics::ProcessMetrics;
use fillet::{Error, Result, VERSION};

use fillet_opts::CmdLineOptions;

use std::path::Path;
use std::time::Instant;

/// Parses `argv`, runs the pump (or the benchmark) and prints the report. Returns `None` when
/// only help or version was requested.
pub fn run<T, U>(argv: T) -> Result<Option<Report>>
where
    T: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    let argv: Vec<String> = argv.into_iter().map(|x| x.as_ref().to_string()).collect();
    let cmd = parse_command(&argv)?;
    if cmd.help || argv.is_empty() {
        Command::print_help();
        return Ok(None);
    }
    if cmd.version {
        println!("fillet {}", VERSION);
        return Ok(None);
    }

    logging::init(&cmd)?;
    match execute(&cmd) {
        Ok(report) => {
            println!("{}", report);
            Ok(Some(report))
        }
        Err(e) => {
            if cmd.debug {
                eprintln!("{}", e.call_stack());
            }
            Err(e)
        }
    }
}

/// Builds the command from defaults, `FILLET_*` variables, the `--config` file and `argv`, each
/// layer overriding the previous one.
pub fn parse_command(argv: &[String]) -> Result<Command> {
    let mut cmd = Command::from_env().map_err(Error::config)?;
    if let Some(path) = config_path(argv) {
        let args = config::load(Path::new(&path), &Command::option_names())?;
        parse_args(&mut cmd, &args)?;
    }
    parse_args(&mut cmd, argv)?;
    Ok(cmd)
}

fn config_path(argv: &[String]) -> Option<String> {
    let mut args = argv.iter();
    let mut path = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            path = args.next().cloned();
        } else if let Some(p) = arg.strip_prefix("--config=") {
            path = Some(p.to_string());
        }
    }
    path
}

fn parse_args(cmd: &mut Command, argv: &[String]) -> Result<()> {
    let mut pos = 0;
    while pos < argv.len() {
        pos += cmd.parse_argv(&argv[pos..]).map_err(Error::config)?;
        let arg = match argv.get(pos) {
            Some(arg) => arg,
            None => break,
        };
        if arg.starts_with('-') && arg != "-" {
            return Err(Error::config(format!("Unknown option '{}'", arg)));
        }
        if let Some(ref path) = cmd.path {
            return Err(Error::config(format!(
                "Unexpected argument '{}' after target path '{}'",
                arg, path
            )));
        }
        cmd.path = Some(arg.clone());
        pos += 1;
    }
    Ok(())
}

fn execute(cmd: &Command) -> Result<Report> {
    let kind = if cmd.use_json {
        ReportKind::Json
    } else {
        ReportKind::Text
    };
    let metrics = ProcessMetrics::new();
    if cmd.benchmark {
        let bench = driver::benchmark(cmd, &metrics)?;
        return Ok(Report::new(kind, ReportBody::Benchmark(bench)));
    }

    let start = Instant::now();
    let mut driver = Driver::from_cmd(cmd)?;
    let targets = driver.run(&metrics, &FsProbe)?;
    Ok(Report::new(
        kind,
        ReportBody::Pump {
            targets,
            elapsed: start.elapsed(),
        },
    ))
}
