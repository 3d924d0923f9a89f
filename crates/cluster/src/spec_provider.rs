//! Spec generation: expand one table definition into the finite set of
//! partition instances it claims right now.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::warn;

use ember_common::{EmberError, Result};
use ember_meta::{
    contains_time_macro, enumerate_paths_with_macros, extract, materialize, PatternMacro, Spec,
    TableConf,
};
use ember_storage::{filesystem_for, FileSystem};

/// Stateless generator walking template expansion and source listing.
pub struct SpecProvider {
    fs_override: Option<Arc<dyn FileSystem>>,
}

impl Default for SpecProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecProvider {
    /// Provider resolving filesystems by scheme.
    pub fn new() -> Self {
        Self { fs_override: None }
    }

    /// Provider using one adapter for every scheme. Test seam.
    pub fn with_filesystem(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs_override: Some(fs),
        }
    }

    fn fs_for(&self, scheme: &str) -> Result<Arc<dyn FileSystem>> {
        match &self.fs_override {
            Some(fs) => Ok(Arc::clone(fs)),
            None => filesystem_for(scheme),
        }
    }

    /// Generate the desired specs of one table at `now`.
    ///
    /// Every spec id is a stable signature over the table, the concrete
    /// path, and the listed content (file signatures), so data growth or
    /// rewrite shows up as a new id while untouched partitions keep theirs
    /// across refreshes.
    pub fn generate(
        &self,
        version: &str,
        table: &TableConf,
        now: i64,
        max_windows: usize,
    ) -> Result<Vec<Spec>> {
        let pattern = extract(&table.location);
        if pattern == PatternMacro::Invalid && contains_time_macro(&table.location) {
            return Err(EmberError::InvalidTemplate(format!(
                "table '{}' template '{}' is not a prefix-complete time decomposition",
                table.name, table.location
            )));
        }

        let mut by_id: HashMap<String, Spec> = HashMap::new();
        for watermark in table.watermarks(pattern, now, max_windows) {
            let materialized = materialize(pattern, &table.location, watermark);
            for (path, values) in enumerate_paths_with_macros(&materialized, &table.macro_values) {
                let scheme = ember_storage::parse(&path)?.scheme;
                let fs = self.fs_for(&scheme)?;
                let files = match fs.list(&path) {
                    Ok(files) => files,
                    Err(e) => {
                        warn!(
                            table = %table.name,
                            path = %path,
                            error = %e,
                            "listing failed; skipping path this cycle"
                        );
                        continue;
                    }
                };
                let mut content: Vec<String> = files
                    .iter()
                    .filter(|f| !f.is_dir)
                    .map(|f| f.signature())
                    .collect();
                if content.is_empty() {
                    continue;
                }
                content.sort();

                let id = signature(&table.name, &path, &content);
                by_id.entry(id.clone()).or_insert_with(|| {
                    Spec::new(
                        id,
                        table.name.clone(),
                        version.to_string(),
                        values,
                        path.clone(),
                        watermark,
                    )
                });
            }
        }
        Ok(by_id.into_values().collect())
    }
}

fn signature(table: &str, path: &str, content: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    table.hash(&mut hasher);
    path.hash(&mut hasher);
    for sig in content {
        sig.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}
