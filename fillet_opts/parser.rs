use std::collections::HashMap;
use std::iter::Peekable;

enum Entry {
    Flag(usize),
    Opt(Vec<String>),
}

/// Collects the values of registered options from the front of an argument list.
pub struct Parser<T, U>
where
    T: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    args: Peekable<<T as IntoIterator>::IntoIter>,
    entries: Vec<Entry>,
    names: HashMap<&'static str, usize>,
    delims: &'static str,
    consumed: usize,
}

impl<T, U> Parser<T, U>
where
    T: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    pub fn new(argv: T, delims: &'static str) -> Self {
        Parser {
            args: argv.into_iter().peekable(),
            entries: Vec::new(),
            names: HashMap::new(),
            delims,
            consumed: 0,
        }
    }

    fn register(&mut self, entry: Entry, names: &[&'static str]) -> &mut Self {
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        for name in names {
            self.names.insert(name, idx);
        }
        self
    }

    pub fn opt(&mut self, names: &[&'static str]) -> &mut Self {
        self.register(Entry::Opt(Vec::new()), names)
    }

    pub fn flag(&mut self, names: &[&'static str]) -> &mut Self {
        self.register(Entry::Flag(0), names)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        match self.names.get(name).map(|&i| &self.entries[i]) {
            Some(Entry::Flag(n)) => *n > 0,
            _ => false,
        }
    }

    pub fn get_opt(&self, name: &str) -> Option<&Vec<String>> {
        match self.names.get(name).map(|&i| &self.entries[i]) {
            Some(Entry::Opt(values)) if !values.is_empty() => Some(values),
            _ => None,
        }
    }

    fn split<'s>(&self, arg: &'s str) -> (&'s str, Option<&'s str>) {
        if !arg.starts_with("--") {
            return (arg, None);
        }
        match arg.find(|c| self.delims.contains(c)) {
            Some(pos) => (&arg[..pos], Some(&arg[pos + 1..])),
            None => (arg, None),
        }
    }

    /// Consumes one option (and its separate value, if any). Returns `Ok(false)` if `arg`
    /// is not a registered option.
    fn parse_one(&mut self, arg: &str) -> Result<bool, String> {
        let (name, value) = self.split(arg);
        let idx = match self.names.get(name) {
            Some(&idx) => idx,
            None => return Ok(false),
        };
        match (&mut self.entries[idx], value) {
            (Entry::Flag(n), None) => *n += 1,
            (Entry::Flag(_), Some(_)) => {
                return Err(format!("Flag '{}' does not take a value", name));
            }
            (Entry::Opt(values), Some(v)) => values.push(v.to_string()),
            (Entry::Opt(values), None) => match self.args.next() {
                Some(next) => {
                    values.push(next.as_ref().to_string());
                    self.consumed += 1;
                }
                None => return Err(format!("Option '{}' requires a value", name)),
            },
        }
        Ok(true)
    }

    /// Parses options until the first unknown argument. Returns how many arguments were
    /// consumed.
    pub fn parse(&mut self) -> Result<usize, String> {
        while let Some(arg) = self.args.peek() {
            let arg = arg.as_ref().to_string();
            if !self.parse_one_peeked(&arg)? {
                break;
            }
        }
        Ok(self.consumed)
    }

    fn parse_one_peeked(&mut self, arg: &str) -> Result<bool, String> {
        let (name, _) = self.split(arg);
        if !self.names.contains_key(name) {
            return Ok(false);
        }
        self.args.next();
        self.consumed += 1;
        self.parse_one(arg)
    }
}
