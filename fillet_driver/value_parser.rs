use crate::cmd::{DictOrder, NewlineMode, NewlineStyle, PumpMode, WordMode, WriteMode};

use fillet::bench::Concurrency;
use fillet::hash::HashAlgorithm;
use fillet::sink::Compression;
use fillet::BufferMode;

use fillet_opts::OptionValueParser;

use log::LevelFilter;

use std::convert::TryFrom;
use std::str::FromStr;
use std::time::Duration;

pub struct DefaultValueParser;
pub struct SizeParser;
pub struct CountParser;
pub struct RangeParser;
pub struct PercentValueParser;

macro_rules! parse_enum {
    ($ty:ty, $expected:expr, { $($s:expr => $v:expr),+ $(,)* }) => {
        impl OptionValueParser<$ty> for DefaultValueParser {
            fn parse(opt: &mut $ty, v: &str) -> Result<(), String> {
                *opt = match v {
                    $($s => $v,)+
                    _ => {
                        return Err(format!(
                            "Unknown value '{}' expected one of: {}",
                            v, $expected
                        ))
                    }
                };
                Ok(())
            }
        }
    };
}

parse_enum!(WordMode, "fixed, random", {
    "fixed" => WordMode::Fixed,
    "random" => WordMode::Random,
});

parse_enum!(WriteMode, "normal-append, normal-write, binary-append, binary-write", {
    "normal-append" => WriteMode::NormalAppend,
    "normal-write" => WriteMode::NormalWrite,
    "binary-append" => WriteMode::BinaryAppend,
    "binary-write" => WriteMode::BinaryWrite,
});

parse_enum!(Option<PumpMode>, "word, bin1, bin0, randbin, randutf8, randhex, random", {
    "word" => Some(PumpMode::Word),
    "bin1" => Some(PumpMode::Bin1),
    "bin0" => Some(PumpMode::Bin0),
    "randbin" => Some(PumpMode::RandBin),
    "randutf8" => Some(PumpMode::RandUtf8),
    "randhex" => Some(PumpMode::RandHex),
    "random" => Some(PumpMode::Random),
});

parse_enum!(DictOrder, "sequential, reverse, presorted, random", {
    "sequential" => DictOrder::Sequential,
    "reverse" => DictOrder::Reverse,
    "presorted" => DictOrder::Presorted,
    "random" => DictOrder::Random,
});

parse_enum!(Option<NewlineMode>, "none, word, char", {
    "none" => Some(NewlineMode::None),
    "word" => Some(NewlineMode::Word),
    "char" => Some(NewlineMode::Char),
});

parse_enum!(NewlineStyle, "lf, cr, crlf", {
    "lf" => NewlineStyle::Lf,
    "cr" => NewlineStyle::Cr,
    "crlf" => NewlineStyle::CrLf,
});

parse_enum!(BufferMode, "ram, stream", {
    "ram" => BufferMode::Ram,
    "stream" => BufferMode::Stream,
});

parse_enum!(Compression, "none, gzip", {
    "none" => Compression::None,
    "gzip" => Compression::Gzip,
});

impl OptionValueParser<Concurrency> for DefaultValueParser {
    fn parse(opt: &mut Concurrency, v: &str) -> Result<(), String> {
        *opt = Concurrency::from_str(v)?;
        Ok(())
    }
}

impl OptionValueParser<Option<HashAlgorithm>> for DefaultValueParser {
    fn parse(opt: &mut Option<HashAlgorithm>, v: &str) -> Result<(), String> {
        *opt = Some(HashAlgorithm::from_str(v)?);
        Ok(())
    }
}

impl OptionValueParser<LevelFilter> for DefaultValueParser {
    fn parse(opt: &mut LevelFilter, v: &str) -> Result<(), String> {
        *opt = match v.to_ascii_lowercase().as_str() {
            "warning" => LevelFilter::Warn,
            "critical" => LevelFilter::Error,
            other => LevelFilter::from_str(other).map_err(|_| {
                format!(
                    "Unknown log level '{}' expected one of: off, error, warn, info, debug, trace",
                    v
                )
            })?,
        };
        Ok(())
    }
}

impl OptionValueParser<bool> for DefaultValueParser {
    fn parse(opt: &mut bool, v: &str) -> Result<(), String> {
        match v {
            "1" => *opt = true,
            "0" => *opt = false,
            _ => {
                return Err(format!(
                    "Invalid value '{}'. Value must be either 0 or 1",
                    v
                ))
            }
        }
        Ok(())
    }
}

impl OptionValueParser<String> for DefaultValueParser {
    fn parse(opt: &mut String, v: &str) -> Result<(), String> {
        *opt = v.to_string();
        Ok(())
    }
}

impl OptionValueParser<Option<String>> for DefaultValueParser {
    fn parse(opt: &mut Option<String>, v: &str) -> Result<(), String> {
        *opt = Some(v.to_string());
        Ok(())
    }
}

impl OptionValueParser<usize> for DefaultValueParser {
    fn parse(opt: &mut usize, v: &str) -> Result<(), String> {
        *opt = parse_number(v)?;
        Ok(())
    }
}

impl OptionValueParser<Option<usize>> for DefaultValueParser {
    fn parse(opt: &mut Option<usize>, v: &str) -> Result<(), String> {
        *opt = Some(parse_number(v)?);
        Ok(())
    }
}

impl OptionValueParser<u32> for DefaultValueParser {
    fn parse(opt: &mut u32, v: &str) -> Result<(), String> {
        *opt = parse_number(v)?;
        Ok(())
    }
}

impl OptionValueParser<Option<u64>> for DefaultValueParser {
    fn parse(opt: &mut Option<u64>, v: &str) -> Result<(), String> {
        *opt = Some(parse_number(v)?);
        Ok(())
    }
}

impl OptionValueParser<Duration> for DefaultValueParser {
    fn parse(opt: &mut Duration, v: &str) -> Result<(), String> {
        *opt = parse_time_value(v)?;
        Ok(())
    }
}

impl OptionValueParser<u64> for SizeParser {
    fn parse(opt: &mut u64, v: &str) -> Result<(), String> {
        *opt = parse_size(v)?;
        Ok(())
    }
}

impl OptionValueParser<Option<u64>> for SizeParser {
    fn parse(opt: &mut Option<u64>, v: &str) -> Result<(), String> {
        *opt = Some(parse_size(v)?);
        Ok(())
    }
}

impl OptionValueParser<u64> for CountParser {
    fn parse(opt: &mut u64, v: &str) -> Result<(), String> {
        *opt = parse_count(v)?;
        Ok(())
    }
}

impl OptionValueParser<Option<u64>> for CountParser {
    fn parse(opt: &mut Option<u64>, v: &str) -> Result<(), String> {
        *opt = Some(parse_count(v)?);
        Ok(())
    }
}

impl OptionValueParser<Option<(u64, u64)>> for RangeParser {
    fn parse(opt: &mut Option<(u64, u64)>, v: &str) -> Result<(), String> {
        let pos = v
            .find(',')
            .ok_or_else(|| format!("Invalid range '{}'. Expected MIN,MAX", v))?;
        let (min, max) = (parse_count(&v[..pos])?, parse_count(&v[pos + 1..])?);
        if max < min {
            return Err(format!("Invalid range '{}'. MAX is less than MIN", v));
        }
        *opt = Some((min, max));
        Ok(())
    }
}

impl OptionValueParser<Option<f64>> for PercentValueParser {
    fn parse(opt: &mut Option<f64>, v: &str) -> Result<(), String> {
        let num = v.strip_suffix('%').unwrap_or(v);
        match num.trim().parse::<f64>() {
            Ok(x) if x.is_finite() && x > 0.0 => {
                *opt = Some(x);
                Ok(())
            }
            _ => Err(format!("Invalid value '{}'", v)),
        }
    }
}

fn parse_number<T: FromStr>(v: &str) -> Result<T, String> {
    v.trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid value '{}'", v))
}

fn split_number(s: &str) -> (&str, &str) {
    let pos = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or_else(|| s.len());
    (&s[..pos], &s[pos..])
}

fn size_unit(unit: &str) -> Option<f64> {
    Some(match unit {
        "" | "b" | "byte" | "bytes" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        "kib" => 1024.0,
        "mib" => f64::powi(1024.0, 2),
        "gib" => f64::powi(1024.0, 3),
        "tib" => f64::powi(1024.0, 4),
        _ => return None,
    })
}

/// Parses `64KiB`, `10MB`, `1.5GiB` or a plain byte count.
pub fn parse_size(v: &str) -> Result<u64, String> {
    let s = v.trim().to_ascii_lowercase();
    let (num, unit) = split_number(&s);
    let value = num
        .parse::<f64>()
        .map_err(|_| format!("Invalid size '{}'", v))?;
    let mult = size_unit(unit.trim()).ok_or_else(|| format!("Invalid unit in size '{}'", v))?;
    let bytes = value * mult;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(format!("Size '{}' is too large", v));
    }
    Ok(bytes as u64)
}

/// Parses `1000`, `1_000`, `1e6` or `2^10`.
pub fn parse_count(v: &str) -> Result<u64, String> {
    let s = v.trim().to_ascii_lowercase().replace('_', "");
    if let Some(pos) = s.find('^') {
        let base = parse_count(&s[..pos])?;
        let exp = parse_count(&s[pos + 1..])?;
        return u32::try_from(exp)
            .ok()
            .and_then(|e| base.checked_pow(e))
            .ok_or_else(|| format!("Count '{}' is too large", v));
    }
    if s.contains('e') {
        return match s.parse::<f64>() {
            Ok(x) if x.is_finite() && x >= 0.0 && x <= u64::MAX as f64 => Ok(x as u64),
            _ => Err(format!("Invalid count '{}'", v)),
        };
    }
    s.parse::<u64>()
        .map_err(|_| format!("Invalid count '{}'", v))
}

fn time_unit(unit: &str) -> Option<f64> {
    Some(match unit {
        "" | "s" => 1.0,
        "ms" => 1e-3,
        "us" => 1e-6,
        "m" | "min" => 60.0,
        "h" => 3600.0,
        _ => return None,
    })
}

/// Parses `0.5`, `250ms`, `2s` or `1m`; a bare number is seconds.
pub fn parse_time_value(v: &str) -> Result<Duration, String> {
    let (num, unit) = split_number(v.trim());
    let secs = num
        .parse::<f64>()
        .ok()
        .and_then(|n| time_unit(unit).map(|m| n * m))
        .ok_or_else(|| format!("Invalid value '{}'", v))?;
    Ok(Duration::from_micros((secs * 1e6).round() as u64))
}
