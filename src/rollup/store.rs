//! Configuration epochs for retention rules.
//!
//! A [`RuleSet`] is never mutated; reloading builds a new one and swaps the
//! shared pointer. Queries take a snapshot once and keep it until they finish.

use crate::core::{Result, TickwiseError};
use crate::rollup::aggregation::AggregationRegistry;
use crate::rollup::rules::RuleSet;
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Current rules plus where they came from
pub struct RulesStore {
    path: PathBuf,
    registry: Arc<AggregationRegistry>,
    current: ArcSwap<RuleSet>,
}

impl RulesStore {
    /// Loads the initial rules from `path`. Fails if they do not parse.
    pub fn load<P: Into<PathBuf>>(path: P, registry: Arc<AggregationRegistry>) -> Result<Self> {
        let path = path.into();
        let rules = RuleSet::from_file(&path, &registry)?;
        tracing::info!(
            path = ?path,
            patterns = rules.patterns().len(),
            "Loaded rollup rules"
        );
        Ok(Self {
            path,
            registry,
            current: ArcSwap::from_pointee(rules),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rules of the current epoch
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Re-reads the rules file. On failure the previous rules stay active.
    pub fn reload(&self) -> Result<()> {
        let rules = RuleSet::from_file(&self.path, &self.registry)?;
        let patterns = rules.patterns().len();
        self.current.store(Arc::new(rules));
        tracing::info!(path = ?self.path, patterns, "Reloaded rollup rules");
        Ok(())
    }

    /// Watches the rules file and reloads it after each modification settles
    /// for `debounce`. Runs until the watcher channel closes.
    pub async fn watch(self: Arc<Self>, debounce: Duration) -> Result<()> {
        use notify::{RecursiveMode, Watcher};

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| TickwiseError::config(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(|e| TickwiseError::config(format!("Failed to watch rules file: {}", e)))?;

        tracing::info!("Watching rollup rules: {:?}", self.path);

        while let Some(event) = rx.recv().await {
            if !matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                continue;
            }

            // Editors write in several steps; wait for the burst to end.
            tokio::time::sleep(debounce).await;
            while rx.try_recv().is_ok() {}

            if let Err(e) = self.reload() {
                tracing::error!(category = e.category(), "Keeping previous rollup rules: {}", e);
            }
        }

        Ok(())
    }
}
