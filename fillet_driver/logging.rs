use crate::cmd::Command;

use fillet::Result;

use env_logger::{Builder, Target};

use std::fs::OpenOptions;
use std::io::Write;

/// Routes `log` records to stderr, or appends them to `--log-file`.
pub fn init(cmd: &Command) -> Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(cmd.log_level).format(|buf, record| {
        writeln!(
            buf,
            "{} {} {}",
            buf.timestamp(),
            record.level(),
            record.args()
        )
    });
    if let Some(ref path) = cmd.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    // A logger installed by an earlier run in this process stays in place.
    let _ = builder.try_init();
    Ok(())
}
