//! Polymorphic call-site cache

use std::sync::atomic::{AtomicU64, Ordering};

use ember_config::CacheConfig;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{ActionDescriptor, Rule};
use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;

/// Cache counters for one call site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSiteStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub cached_rules: usize,
}

impl CallSiteStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32) / (total as f32) * 100.0
        }
    }
}

/// A dynamic call site: one descriptor, up to `capacity` cached rules
///
/// Rules are tried in insertion order. On a miss the descriptor's binder is
/// consulted and the new rule appended; when full, the oldest rule is evicted.
/// A capacity of zero disables caching (every call rebinds).
pub struct CallSite {
    descriptor: ActionDescriptor,
    rules: RwLock<Vec<Rule>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CallSite {
    pub fn new(descriptor: ActionDescriptor, config: &CacheConfig) -> Self {
        Self::with_capacity(descriptor, config.max_polymorphic_rules)
    }

    pub fn with_capacity(descriptor: ActionDescriptor, capacity: usize) -> Self {
        Self {
            descriptor,
            rules: RwLock::new(Vec::with_capacity(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    /// Run the operation, reusing a cached rule when one applies
    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        let cached = self
            .rules
            .read()
            .iter()
            .find(|rule| rule.applies(args))
            .cloned();

        if let Some(rule) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(target: "ember::action", kind = ?self.descriptor.kind(), "call site hit");
            return rule.invoke(args);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let rule = self.descriptor.binder().bind(&self.descriptor, args)?;
        debug!(target: "ember::action", kind = ?self.descriptor.kind(), "call site miss, bound new rule");
        self.insert(rule.clone());
        rule.invoke(args)
    }

    fn insert(&self, rule: Rule) {
        if self.capacity == 0 {
            return;
        }
        let mut rules = self.rules.write();
        if rules.len() >= self.capacity {
            rules.remove(0);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Drop every cached rule, e.g. after the binder's world changed
    pub fn invalidate(&self) {
        self.rules.write().clear();
    }

    pub fn stats(&self) -> CallSiteStats {
        CallSiteStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            cached_rules: self.rule_count(),
        }
    }
}

impl std::fmt::Debug for CallSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite")
            .field("descriptor", &self.descriptor)
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}
