// src/domain.rs
use dashmap::DashSet;
use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const LEADING_JUNK: [char; 6] = ['\\', '.', '/', '#', '$', '%'];

/// Cleans a raw finding into a canonical domain string.
///
/// The cleanup steps are repeated until the value stops changing, so the
/// result is always a fixed point: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let mut domain = raw.to_lowercase();

    if let Some(idx) = domain.find("//") {
        domain = domain[idx + 2..].to_string();
    }

    if domain.ends_with('.') {
        domain.pop();
    }

    let domain = domain.trim_start_matches(&LEADING_JUNK[..]);

    let domain = match domain.split_once('@') {
        Some((_, host)) => host,
        None => domain,
    };

    domain.trim().to_string()
}

/// True when `domain` is `target` itself or ends with `.target`.
pub fn in_scope(domain: &str, target: &str) -> bool {
    domain == target
        || (domain.len() > target.len()
            && domain.ends_with(target)
            && domain.as_bytes()[domain.len() - target.len() - 1] == b'.')
}

/// Concurrency-safe accumulator of normalized names for one target run.
///
/// Clones share the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct DomainSet {
    inner: Arc<DashSet<String>>,
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `raw` and inserts it. Returns true if the set grew.
    pub fn add(&self, raw: &str) -> bool {
        let domain = normalize(raw);
        if domain.is_empty() {
            return false;
        }
        self.inner.insert(domain)
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.inner.contains(&normalize(domain))
    }

    pub fn size(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted copy of the current contents.
    pub fn snapshot(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.inner.iter().map(|d| d.key().clone()).collect();
        domains.sort();
        domains
    }
}

/// Per-connector write handle onto a [`DomainSet`].
///
/// Applies the target scope filter (unless the connector opted out) and
/// counts how many new names this connector contributed.
pub struct DomainSink {
    set: DomainSet,
    target: String,
    scoped: bool,
    contributed: AtomicUsize,
}

impl DomainSink {
    pub fn new(set: DomainSet, target: &str, scoped: bool) -> Self {
        Self {
            set,
            target: target.to_string(),
            scoped,
            contributed: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn add(&self, raw: &str) -> bool {
        let domain = normalize(raw);
        if domain.is_empty() {
            return false;
        }
        if self.scoped && !in_scope(&domain, &self.target) {
            trace!("Rejected out-of-scope finding {} for {}", domain, self.target);
            return false;
        }
        let added = self.set.add(&domain);
        if added {
            self.contributed.fetch_add(1, Ordering::Relaxed);
        }
        added
    }

    pub fn contributed(&self) -> usize {
        self.contributed.load(Ordering::Relaxed)
    }
}
