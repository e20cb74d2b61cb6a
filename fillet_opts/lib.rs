//! Command line option traits, the argv parser and help rendering used by `#[derive(CmdLineOptions)]`.
//!
//! # Examples
//! ```
//! use fillet_opts::*;
//!
//! #[derive(CmdLineOptions, Default)]
//! #[optcont(delimeters = "=", usage = "tool [options] <path>")]
//! struct Opts {
//!     #[flag(names("-q", "--quiet"), desc = "Print nothing")]
//!     quiet: bool,
//!
//!     #[opt(
//!         name = "--ratio",
//!         desc = "A ratio",
//!         value_desc = "<float>",
//!         env = "TOOL_RATIO",
//!         parser = "FloatParser"
//!     )]
//!     ratio: f64,
//! }
//!
//! struct FloatParser;
//!
//! impl OptionValueParser<f64> for FloatParser {
//!     fn parse(opt: &mut f64, v: &str) -> Result<(), String> {
//!         v.parse::<f64>()
//!             .map(|x| *opt = x)
//!             .map_err(|_| format!("Invalid value '{}'", v))
//!     }
//! }
//!
//! let mut opts = Opts::default();
//! assert_eq!(opts.parse_argv(&["-q", "--ratio=0.5", "out.txt"]), Ok(2));
//! assert!(opts.quiet);
//! ```

extern crate fillet_opts_derive;

pub mod parser;

pub use fillet_opts_derive::*;

use std::fmt;

pub struct OptionHelp {
    pub names: Vec<String>,
    pub desc: Option<String>,
    pub value_desc: Option<String>,
    pub env: Option<String>,
}

pub struct Help {
    pub overview: Option<String>,
    pub usage: Option<String>,
    pub delimeters: Option<String>,
    pub options: Vec<OptionHelp>,
}

pub trait CmdLineOptions: Sized {
    fn help() -> Help;

    /// Parses leading options of `argv` and returns how many arguments were consumed. Parsing
    /// stops at the first argument that is not a known option.
    fn parse_argv<T, U>(&mut self, argv: T) -> Result<usize, String>
    where
        T: IntoIterator<Item = U>,
        U: AsRef<str>;

    fn parse_env(&mut self) -> Result<(), String>;
}

pub trait OptionValueParser<T> {
    fn parse(opt: &mut T, val: &str) -> Result<(), String>;
}

const MAX_NAMES_WIDTH: usize = 34;
const INDENT: &str = "  ";

impl OptionHelp {
    fn names_line(&self, delim: char) -> String {
        self.names
            .iter()
            .map(|name| match self.value_desc {
                Some(ref vd) => format!("{}{}{}", name, delim, vd),
                None => name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Help {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref overview) = self.overview {
            writeln!(f, "{}\n", overview)?;
        }
        if let Some(ref usage) = self.usage {
            writeln!(f, "Usage: {}\n", usage)?;
        }
        if self.options.is_empty() {
            return Ok(());
        }

        let delim = self
            .delimeters
            .as_ref()
            .and_then(|d| d.chars().next())
            .unwrap_or(' ');
        let lines: Vec<String> = self.options.iter().map(|o| o.names_line(delim)).collect();
        let width = lines
            .iter()
            .map(|l| l.len())
            .filter(|&l| l <= MAX_NAMES_WIDTH)
            .max()
            .unwrap_or(0);

        f.write_str("Options:\n")?;
        for (opt, names) in self.options.iter().zip(lines.iter()) {
            write_opt(f, opt, names, width)?;
        }

        let envs: Vec<&OptionHelp> = self.options.iter().filter(|o| o.env.is_some()).collect();
        if !envs.is_empty() {
            f.write_str("\nEnvironment variables:\n")?;
            for opt in envs {
                if let Some(ref env) = opt.env {
                    writeln!(
                        f,
                        "{}{:w$}  {}",
                        INDENT,
                        env,
                        opt.names.join(", "),
                        w = width
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn write_opt(f: &mut fmt::Formatter, opt: &OptionHelp, names: &str, width: usize) -> fmt::Result {
    let mut desc = opt
        .desc
        .as_ref()
        .map(|d| d.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    write!(f, "{}{}", INDENT, names)?;
    if names.len() > width {
        f.write_str("\n")?;
        write!(f, "{}{:w$}", INDENT, "", w = width)?;
    } else {
        write!(f, "{:w$}", "", w = width - names.len())?;
    }
    match desc.next() {
        Some(first) => writeln!(f, "  {}", first)?,
        None => f.write_str("\n")?,
    }
    for line in desc {
        writeln!(f, "{}{:w$}  {}", INDENT, "", line, w = width)?;
    }
    Ok(())
}
