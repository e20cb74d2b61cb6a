//! Chunk sources built from command line options: words, dictionaries and byte patterns.

use crate::cmd::{Command, DictOrder, NewlineMode, PumpMode, WordMode};

use fillet::{Chunk, ChunkSource, Error, Result};

use encoding::label::encoding_from_whatwg_label;
use encoding::{DecoderTrap, EncoderTrap, Encoding, EncodingRef};

use log::{debug, warn};

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DETECT_PREFIX: u64 = 4096;

/// Produces the token stream of word mode.
pub trait Tokens: Send {
    fn next_token(&mut self) -> Result<String>;

    fn fork(&mut self) -> Option<Box<dyn Tokens>> {
        None
    }
}

/// Turns tokens into bytes: encoding plus newline insertion.
#[derive(Clone)]
pub struct TextEncoder {
    encoding: EncodingRef,
    newline_mode: NewlineMode,
    newline: &'static str,
}

pub struct TokenSource {
    tokens: Box<dyn Tokens>,
    text: TextEncoder,
}

pub struct PatternSource {
    mode: PumpMode,
    chunk: usize,
    rng: StdRng,
}

/// Builds a fresh source for every target from the same options.
pub struct SourceFactory {
    kind: Kind,
    text: TextEncoder,
    rng: StdRng,
}

enum Kind {
    Pattern(PumpMode, usize),
    Fixed(String),
    RandomCase(String),
    Cycle(Arc<Vec<String>>),
    Weighted(Arc<Vec<String>>, Option<WeightedIndex<f64>>),
    Markov(Arc<Markov>),
    Stream(Vec<PathBuf>),
}

struct Fixed(String);

struct RandomCase {
    word: String,
    rng: StdRng,
}

struct Cycle {
    words: Arc<Vec<String>>,
    pos: usize,
}

struct Weighted {
    words: Arc<Vec<String>>,
    dist: Option<WeightedIndex<f64>>,
    rng: StdRng,
}

/// Word-level n-gram model.
pub struct Markov {
    transitions: HashMap<Vec<String>, Vec<String>>,
    prefixes: Vec<Vec<String>>,
}

struct MarkovTokens {
    model: Arc<Markov>,
    prefix: Vec<String>,
    rng: StdRng,
}

/// Streams the lines of several dictionaries in order without loading them.
struct DictStream {
    paths: Vec<PathBuf>,
    encoding: EncodingRef,
    idx: usize,
    reader: Option<BufReader<File>>,
    yielded: bool,
}

impl TextEncoder {
    pub fn new(encoding: EncodingRef, newline_mode: NewlineMode, newline: &'static str) -> Self {
        Self {
            encoding,
            newline_mode,
            newline,
        }
    }

    fn encode_str(&self, s: &str) -> Result<Vec<u8>> {
        self.encoding
            .encode(s, EncoderTrap::Replace)
            .map_err(|e| Error::from(format!("Unable to encode '{}': {}", s, e)))
    }

    pub fn encode(&self, token: &str) -> Result<Chunk> {
        let nl = self.newline.as_bytes();
        match self.newline_mode {
            NewlineMode::None => self.encode_str(token),
            NewlineMode::Word => {
                let mut bytes = self.encode_str(token)?;
                bytes.extend_from_slice(nl);
                Ok(bytes)
            }
            NewlineMode::Char => {
                let mut bytes = Vec::new();
                let mut buf = [0u8; 4];
                for c in token.chars() {
                    bytes.extend(self.encode_str(c.encode_utf8(&mut buf))?);
                    bytes.extend_from_slice(nl);
                }
                Ok(bytes)
            }
        }
    }
}

impl TokenSource {
    pub fn new(tokens: Box<dyn Tokens>, text: TextEncoder) -> Self {
        Self { tokens, text }
    }
}

impl ChunkSource for TokenSource {
    fn next_chunk(&mut self) -> Result<Chunk> {
        let token = self.tokens.next_token()?;
        self.text.encode(&token)
    }

    fn fork(&mut self) -> Option<Box<dyn ChunkSource>> {
        let tokens = self.tokens.fork()?;
        Some(Box::new(TokenSource::new(tokens, self.text.clone())))
    }
}

impl PatternSource {
    pub fn new(mode: PumpMode, chunk: usize, rng: StdRng) -> Self {
        Self { mode, chunk, rng }
    }

    fn fill(&mut self, mode: PumpMode) -> Chunk {
        match mode {
            PumpMode::Bin1 => vec![0xFF; self.chunk],
            PumpMode::Bin0 | PumpMode::Word => vec![0; self.chunk],
            PumpMode::RandBin => {
                let mut buf = vec![0; self.chunk];
                self.rng.fill_bytes(&mut buf);
                buf
            }
            // Printable ASCII without whitespace.
            PumpMode::RandUtf8 => (0..self.chunk)
                .map(|_| self.rng.gen_range(0x21u8..=0x7e))
                .collect(),
            PumpMode::RandHex => {
                let mut raw = vec![0; hex_len(self.chunk) / 2];
                self.rng.fill_bytes(&mut raw);
                hex::encode(raw).into_bytes()
            }
            PumpMode::Random => {
                let modes = [
                    PumpMode::Bin1,
                    PumpMode::Bin0,
                    PumpMode::RandBin,
                    PumpMode::RandUtf8,
                    PumpMode::RandHex,
                ];
                let pick = modes[self.rng.gen_range(0..modes.len())];
                self.fill(pick)
            }
        }
    }
}

impl ChunkSource for PatternSource {
    fn next_chunk(&mut self) -> Result<Chunk> {
        Ok(self.fill(self.mode))
    }

    fn fork(&mut self) -> Option<Box<dyn ChunkSource>> {
        Some(Box::new(PatternSource::new(
            self.mode,
            self.chunk,
            fork_rng(&mut self.rng),
        )))
    }
}

/// Hex chunks are a whole number of encoded bytes, at least one.
fn hex_len(chunk: usize) -> usize {
    (chunk / 2).max(1) * 2
}

fn fork_rng(rng: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(rng.gen())
}

impl Tokens for Fixed {
    fn next_token(&mut self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn fork(&mut self) -> Option<Box<dyn Tokens>> {
        Some(Box::new(Fixed(self.0.clone())))
    }
}

impl Tokens for RandomCase {
    fn next_token(&mut self) -> Result<String> {
        Ok(if self.rng.gen_bool(0.5) {
            self.word.to_lowercase()
        } else {
            self.word.to_uppercase()
        })
    }

    fn fork(&mut self) -> Option<Box<dyn Tokens>> {
        Some(Box::new(RandomCase {
            word: self.word.clone(),
            rng: fork_rng(&mut self.rng),
        }))
    }
}

// Ordered streams are not forked: parallel writers share one sequence.
impl Tokens for Cycle {
    fn next_token(&mut self) -> Result<String> {
        let word = self.words[self.pos].clone();
        self.pos = (self.pos + 1) % self.words.len();
        Ok(word)
    }
}

impl Tokens for Weighted {
    fn next_token(&mut self) -> Result<String> {
        let idx = match self.dist {
            Some(ref dist) => dist.sample(&mut self.rng),
            None => self.rng.gen_range(0..self.words.len()),
        };
        Ok(self.words[idx].clone())
    }

    fn fork(&mut self) -> Option<Box<dyn Tokens>> {
        Some(Box::new(Weighted {
            words: self.words.clone(),
            dist: self.dist.clone(),
            rng: fork_rng(&mut self.rng),
        }))
    }
}

impl Markov {
    /// Returns `None` if there are fewer than `n` words.
    pub fn build(words: &[String], n: usize) -> Option<Self> {
        let n = n.max(2);
        if words.len() < n {
            return None;
        }
        let mut transitions: HashMap<Vec<String>, Vec<String>> = HashMap::new();
        let mut prefixes = Vec::new();
        for window in words.windows(n) {
            let prefix = window[..n - 1].to_vec();
            let next = window[n - 1].clone();
            let choices = transitions.entry(prefix.clone()).or_insert_with(|| {
                prefixes.push(prefix);
                Vec::new()
            });
            choices.push(next);
        }
        Some(Self {
            transitions,
            prefixes,
        })
    }

    fn random_prefix(&self, rng: &mut StdRng) -> Vec<String> {
        self.prefixes[rng.gen_range(0..self.prefixes.len())].clone()
    }
}

impl MarkovTokens {
    fn new(model: Arc<Markov>, mut rng: StdRng) -> Self {
        let prefix = model.random_prefix(&mut rng);
        Self { model, prefix, rng }
    }
}

impl Tokens for MarkovTokens {
    fn next_token(&mut self) -> Result<String> {
        loop {
            let next = match self.model.transitions.get(&self.prefix) {
                Some(choices) => choices.choose(&mut self.rng).cloned(),
                None => None,
            };
            match next {
                Some(word) => {
                    self.prefix.remove(0);
                    self.prefix.push(word.clone());
                    return Ok(word);
                }
                None => self.prefix = self.model.random_prefix(&mut self.rng),
            }
        }
    }

    fn fork(&mut self) -> Option<Box<dyn Tokens>> {
        let rng = fork_rng(&mut self.rng);
        Some(Box::new(MarkovTokens::new(self.model.clone(), rng)))
    }
}

impl DictStream {
    fn new(paths: Vec<PathBuf>, encoding: EncodingRef) -> Self {
        Self {
            paths,
            encoding,
            idx: 0,
            reader: None,
            yielded: false,
        }
    }
}

impl Tokens for DictStream {
    fn next_token(&mut self) -> Result<String> {
        let mut line = Vec::new();
        loop {
            if self.reader.is_none() {
                if self.idx == self.paths.len() {
                    if !self.yielded {
                        return Err(Error::config("Dictionaries contain no words"));
                    }
                    self.idx = 0;
                    self.yielded = false;
                }
                let path = &self.paths[self.idx];
                debug!("Streaming dictionary {}", path.display());
                self.reader = Some(BufReader::new(File::open(path)?));
                self.idx += 1;
            }

            line.clear();
            let read = match self.reader {
                Some(ref mut reader) => reader.read_until(b'\n', &mut line)?,
                None => 0,
            };
            if read == 0 {
                self.reader = None;
                continue;
            }
            let text = decode(self.encoding, &line)?;
            let word = text.trim();
            if !word.is_empty() {
                self.yielded = true;
                return Ok(word.to_string());
            }
        }
    }
}

fn decode(encoding: EncodingRef, bytes: &[u8]) -> Result<String> {
    encoding
        .decode(bytes, DecoderTrap::Replace)
        .map_err(|e| Error::from(format!("Unable to decode dictionary text: {}", e)))
}

/// Splits an optional trailing weight off a dictionary line: `token 2.5`.
pub fn split_weight(line: &str) -> (String, Option<f64>) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() >= 2 {
        let last = parts[parts.len() - 1];
        let digits = last.chars().filter(|c| c.is_ascii_digit()).count();
        let dots = last.chars().filter(|&c| c == '.').count();
        if digits > 0 && digits + dots == last.len() && dots <= 1 {
            if let Ok(w) = last.parse::<f64>() {
                return (parts[..parts.len() - 1].join(" "), Some(w.max(0.0)));
            }
        }
    }
    (line.to_string(), None)
}

fn read_words(path: &Path, encoding: EncodingRef) -> Result<Vec<String>> {
    let text = decode(encoding, &fs::read(path)?)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Lines of a list file; relative entries are resolved against the list's directory.
pub fn read_path_list(list: &Path) -> Result<Vec<PathBuf>> {
    let text = String::from_utf8_lossy(&fs::read(list)?).into_owned();
    let base = list.parent().unwrap_or_else(|| Path::new(""));
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let p = Path::new(l);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        })
        .collect())
}

/// Resolves an encoding label; `auto` inspects the start of `sample`.
pub fn resolve_encoding(label: &str, sample: Option<&Path>) -> Result<EncodingRef> {
    if label.eq_ignore_ascii_case("auto") {
        return Ok(match sample {
            Some(path) => detect_encoding(path)?,
            None => encoding::all::UTF_8,
        });
    }
    encoding_from_whatwg_label(label)
        .ok_or_else(|| Error::config(format!("Unknown encoding: {}", label)))
}

fn detect_encoding(path: &Path) -> Result<EncodingRef> {
    let mut prefix = Vec::new();
    File::open(path)?
        .take(DETECT_PREFIX)
        .read_to_end(&mut prefix)?;

    // A multi-byte sequence cut at the end of the prefix still counts as UTF-8.
    match std::str::from_utf8(&prefix) {
        Ok(_) => return Ok(encoding::all::UTF_8),
        Err(e) if e.error_len().is_none() => return Ok(encoding::all::UTF_8),
        Err(_) => {}
    }
    let (charset, confidence, _) = chardet::detect(&prefix);
    let detected = encoding_from_whatwg_label(chardet::charset2encoding(&charset));
    debug!(
        "Detected encoding of {}: {} ({:.2})",
        path.display(),
        charset,
        confidence
    );
    Ok(detected.unwrap_or(encoding::all::WINDOWS_1252))
}

impl SourceFactory {
    pub fn from_cmd(cmd: &Command, rng: StdRng) -> Result<Self> {
        let mode = cmd.pump_mode();
        let dicts = dictionaries(cmd)?;
        let encoding = resolve_encoding(&cmd.encoding, dicts.first().map(PathBuf::as_path))?;
        let text = TextEncoder::new(encoding, cmd.newline_mode(), cmd.newline_style.as_str());

        let kind = if mode.is_pattern() {
            if cmd.chunk == 0 {
                return Err(Error::config("--chunk must be greater than zero"));
            }
            Kind::Pattern(mode, cmd.chunk as usize)
        } else if !dicts.is_empty() {
            dictionary_kind(cmd, dicts, encoding)?
        } else {
            let word = cmd.word.clone().ok_or_else(|| {
                Error::config("--word is required for pump-mode=word without --dict")
            })?;
            match cmd.word_mode {
                WordMode::Fixed => Kind::Fixed(word),
                WordMode::Random => Kind::RandomCase(word),
            }
        };
        Ok(Self { kind, text, rng })
    }

    /// Byte length of every chunk, when all chunks are the same size.
    pub fn chunk_len(&self) -> Result<Option<u64>> {
        Ok(match self.kind {
            Kind::Pattern(PumpMode::RandHex, chunk) => Some(hex_len(chunk) as u64),
            Kind::Pattern(PumpMode::Random, chunk) if hex_len(chunk) != chunk => None,
            Kind::Pattern(_, chunk) => Some(chunk as u64),
            Kind::Fixed(ref word) => Some(self.text.encode(word)?.len() as u64),
            _ => None,
        })
    }

    pub fn source(&mut self) -> Result<Box<dyn ChunkSource>> {
        let rng = fork_rng(&mut self.rng);
        let tokens: Box<dyn Tokens> = match self.kind {
            Kind::Pattern(mode, chunk) => return Ok(Box::new(PatternSource::new(mode, chunk, rng))),
            Kind::Fixed(ref word) => Box::new(Fixed(word.clone())),
            Kind::RandomCase(ref word) => Box::new(RandomCase {
                word: word.clone(),
                rng,
            }),
            Kind::Cycle(ref words) => Box::new(Cycle {
                words: words.clone(),
                pos: 0,
            }),
            Kind::Weighted(ref words, ref dist) => Box::new(Weighted {
                words: words.clone(),
                dist: dist.clone(),
                rng,
            }),
            Kind::Markov(ref model) => Box::new(MarkovTokens::new(model.clone(), rng)),
            Kind::Stream(ref paths) => {
                let encoding = self.text.encoding;
                Box::new(DictStream::new(paths.clone(), encoding))
            }
        };
        Ok(Box::new(TokenSource::new(tokens, self.text.clone())))
    }
}

fn dictionaries(cmd: &Command) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if let Some(ref dict) = cmd.dict {
        paths.push(PathBuf::from(dict));
    }
    if let Some(ref list) = cmd.dict_list {
        paths.extend(read_path_list(Path::new(list))?);
    }
    Ok(paths)
}

fn dictionary_kind(cmd: &Command, paths: Vec<PathBuf>, encoding: EncodingRef) -> Result<Kind> {
    if cmd.markov && !cmd.dict_ram {
        return Err(Error::config("--markov requires --dict-ram"));
    }

    if cmd.dict_ram {
        let mut words = Vec::new();
        let mut weights = Vec::new();
        let mut weighted = false;
        for path in &paths {
            for line in read_words(path, encoding)? {
                let (word, weight) = split_weight(&line);
                weighted |= weight.is_some();
                weights.push(weight.unwrap_or(1.0));
                words.push(word);
            }
        }
        if words.is_empty() {
            return Err(Error::config("Dictionaries contain no words"));
        }
        debug!("Loaded {} words from {} dictionaries", words.len(), paths.len());

        if cmd.markov {
            return Ok(match Markov::build(&words, cmd.ngram) {
                Some(model) => Kind::Markov(Arc::new(model)),
                None => {
                    warn!("Too few words for a {}-gram model; cycling the dictionary", cmd.ngram);
                    Kind::Cycle(Arc::new(words))
                }
            });
        }
        let dist = if weighted {
            match WeightedIndex::new(&weights) {
                Ok(dist) => Some(dist),
                Err(e) => {
                    warn!("Ignoring dictionary weights: {}", e);
                    None
                }
            }
        } else {
            None
        };
        return Ok(ordered(words, cmd.dict_order, dist));
    }

    if paths.len() == 1 && cmd.dict_order != DictOrder::Sequential {
        let words = read_words(&paths[0], encoding)?;
        if words.is_empty() {
            return Err(Error::config("Dictionaries contain no words"));
        }
        return Ok(ordered(words, cmd.dict_order, None));
    }
    if cmd.dict_order != DictOrder::Sequential {
        return Err(Error::config(
            "--dict-order requires --dict-ram for non-sequential orders of several dictionaries",
        ));
    }
    Ok(Kind::Stream(paths))
}

fn ordered(mut words: Vec<String>, order: DictOrder, dist: Option<WeightedIndex<f64>>) -> Kind {
    match order {
        DictOrder::Sequential => {}
        DictOrder::Reverse => words.reverse(),
        DictOrder::Presorted => words.sort(),
        DictOrder::Random => return Kind::Weighted(Arc::new(words), dist),
    }
    Kind::Cycle(Arc::new(words))
}
