use std::collections::HashMap;
use std::rc::{Rc, Weak};

use regex::Regex;
use tracing::debug;

use super::destination::Destination;
use crate::sink::{downgrade, Sink};
use crate::{Error, Result};

/// Prefix marking an endpoint name as a pattern.
pub const PATTERN_PREFIX: char = '/';

/// Whether `name` is written as a pattern.
pub fn is_pattern(name: &str) -> bool {
    name.starts_with(PATTERN_PREFIX)
}

/// An endpoint name, or a pattern matching endpoint names.
///
/// Patterns are written `/regex` or `/regex/` and must match the whole name.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Exact(String),
    Pattern { name: String, regex: Regex },
}

impl NameMatcher {
    /// # Errors
    /// [Error::Pattern] if a pattern is not a valid regular expression.
    pub fn parse(name: &str) -> Result<Self> {
        let Some(body) = name.strip_prefix(PATTERN_PREFIX) else {
            return Ok(NameMatcher::Exact(name.to_string()));
        };
        let body = body.strip_suffix(PATTERN_PREFIX).unwrap_or(body);
        let regex = Regex::new(&format!("^(?:{body})$")).map_err(|source| Error::Pattern {
            pattern: name.to_string(),
            source,
        })?;
        Ok(NameMatcher::Pattern {
            name: name.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Exact(exact) => exact == name,
            NameMatcher::Pattern { regex, .. } => regex.is_match(name),
        }
    }

    /// The name as written.
    pub fn as_str(&self) -> &str {
        match self {
            NameMatcher::Exact(name) | NameMatcher::Pattern { name, .. } => name,
        }
    }
}

impl std::fmt::Display for NameMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named fan-out points that route outputs are attached to.
///
/// Every registered name owns a [Destination]. Names written as patterns additionally collect
/// the write ends of every endpoint whose name they match.
#[derive(Debug, Default)]
pub struct EndpointStore {
    endpoints: HashMap<String, Rc<Destination>>,
    patterns: Vec<(Regex, Rc<Destination>)>,
}

impl EndpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the destination for `name`. Registering a name again returns the existing one.
    ///
    /// # Errors
    /// [Error::Pattern] if `name` is an invalid pattern; nothing is registered.
    pub fn register_name(&mut self, name: &str) -> Result<Rc<Destination>> {
        if let Some(dst) = self.endpoints.get(name) {
            return Ok(Rc::clone(dst));
        }
        let dst = Rc::new(Destination::new());
        if let NameMatcher::Pattern { regex, .. } = NameMatcher::parse(name)? {
            self.patterns.push((regex, Rc::clone(&dst)));
        }
        debug!(endpoint = name, "registered");
        self.endpoints.insert(name.to_string(), Rc::clone(&dst));
        Ok(dst)
    }

    /// Attach the write end of endpoint `name` to its own destination and to every pattern
    /// destination matching `name`. Returns the number of destinations joined.
    pub fn register_write_end(&self, name: &str, sink: Weak<dyn Sink>) -> usize {
        let mut joined = 0;
        if let Some(dst) = self.endpoints.get(name) {
            dst.add(sink.clone());
            joined += 1;
        }
        for (regex, dst) in &self.patterns {
            if regex.is_match(name) {
                dst.add(sink.clone());
                joined += 1;
            }
        }
        debug!(endpoint = name, joined, "write end registered");
        joined
    }

    /// Add to `dest` the destination registered as `name` and, when `name` is not a pattern,
    /// every pattern destination matching it. Returns the number of destinations added.
    pub fn connect_to_dest(&self, name: &str, dest: &Destination) -> usize {
        let mut added = 0;
        if let Some(dst) = self.endpoints.get(name) {
            dest.add(downgrade(dst));
            added += 1;
        }
        if !is_pattern(name) {
            for (regex, dst) in &self.patterns {
                if regex.is_match(name) {
                    dest.add(downgrade(dst));
                    added += 1;
                }
            }
        }
        added
    }

    pub fn get(&self, name: &str) -> Option<Rc<Destination>> {
        self.endpoints.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Registered names, patterns included, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.endpoints.clear();
        self.patterns.clear();
    }
}
