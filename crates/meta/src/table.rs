//! Table configuration and the per-table registry of desired specs.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::macros::PatternMacro;
use crate::spec::Spec;

/// One table definition from cluster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConf {
    /// Table name.
    pub name: String,
    /// Source-path template, possibly carrying time and value macros.
    pub location: String,
    /// How far back this table claims data, in seconds.
    #[serde(default)]
    pub retention_secs: u64,
    /// Non-time macro axes expanded into the template.
    #[serde(default)]
    pub macro_values: BTreeMap<String, Vec<String>>,
    /// Free-form adapter/loader options.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl TableConf {
    /// Watermarks this table claims right now: unit-aligned steps walking
    /// back from the wall clock through the retention window, newest first.
    ///
    /// Granularity-free templates (timestamp or no time macro) yield the
    /// current clock as the single watermark.
    pub fn watermarks(&self, m: PatternMacro, now: i64, max_windows: usize) -> Vec<i64> {
        let unit = m.granularity_seconds() as i64;
        if unit == 0 {
            return vec![now];
        }
        let aligned = now - now.rem_euclid(unit);
        let count = (self.retention_secs as i64 / unit).max(1) as usize;
        let count = count.min(max_windows.max(1));
        (0..count).map(|k| aligned - k as i64 * unit).collect()
    }
}

/// Registry of the desired specs of one table, keyed by spec id.
///
/// The registry is the exclusive owner of [`Spec`]s. `update` merges a
/// freshly generated snapshot: ids already present are preserved verbatim,
/// new ids are inserted, disappeared ids are dropped (their blocks are
/// expired off the workers on the next expire pass).
#[derive(Debug, Default)]
pub struct TableRegistry {
    table: String,
    specs: HashMap<String, Spec>,
}

impl TableRegistry {
    /// Empty registry for a table.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            specs: HashMap::new(),
        }
    }

    /// Table this registry tracks.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Merge a generated snapshot into the registry.
    pub fn update(&mut self, snapshot: Vec<Spec>) {
        let incoming: HashSet<&str> = snapshot.iter().map(|s| s.id.as_str()).collect();
        self.specs.retain(|id, _| incoming.contains(id.as_str()));
        for spec in snapshot {
            self.specs.entry(spec.id.clone()).or_insert(spec);
        }
    }

    /// Whether the desired set currently contains this spec id.
    pub fn online(&self, id: &str) -> bool {
        self.specs.contains_key(id)
    }

    /// Number of desired specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when no specs are desired.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Spec ids in sorted order, for deterministic walks.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.specs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Immutable lookup by id.
    pub fn get(&self, id: &str) -> Option<&Spec> {
        self.specs.get(id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Spec> {
        self.specs.get_mut(id)
    }

    /// Iterate all specs mutably.
    pub fn specs_mut(&mut self) -> impl Iterator<Item = &mut Spec> {
        self.specs.values_mut()
    }

    /// Iterate all specs.
    pub fn specs(&self) -> impl Iterator<Item = &Spec> {
        self.specs.values()
    }
}
