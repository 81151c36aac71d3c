//! Directory tree cache: the in-process authority for the calibration
//! hierarchy.
//!
//! # Responsibility
//! - Keep one validated directory tree generation in memory.
//! - Decide when a rebuild is required, via the source's change signal.
//! - Answer id/path/children/search lookups without upstream round trips.
//!
//! # Invariants
//! - Readers always see a complete generation or none; a rebuild
//!   publishes with one atomic swap and never mutates live nodes.
//! - At most one rebuild runs at a time.
//! - A failed rebuild leaves the previous generation servable; only the
//!   very first load has nothing to fall back to.

use crate::model::directory::{DbKey, Directory, ROOT_ID, ROOT_PATH};
use crate::repo::directory_repo::{ChangeSignal, DirectorySource, SourceError};
use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod generation;

pub use generation::{Generation, StructuralError};

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// What a rebuild attempt ran into.
#[derive(Debug)]
pub enum RebuildError {
    /// The record supplier or staleness probe failed.
    Fetch(SourceError),
    /// The fetched record set does not form a valid tree.
    Structural(StructuralError),
}

impl Display for RebuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Structural(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RebuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Structural(err) => Some(err),
        }
    }
}

/// Errors surfaced by the directory cache.
#[derive(Debug)]
pub enum CacheError {
    /// No generation was ever built; nothing can be served.
    NeverLoaded(RebuildError),
    /// Refresh failed; the previous generation is still being served.
    RefreshFailed(RebuildError),
    /// A wildcard search pattern could not be compiled.
    InvalidPattern { pattern: String, message: String },
    /// The cache is shutting down and will not rebuild.
    ShuttingDown,
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverLoaded(err) => {
                write!(f, "no directory tree loaded yet: {err}")
            }
            Self::RefreshFailed(err) => write!(
                f,
                "directory tree refresh failed, previous generation retained: {err}"
            ),
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid search pattern `{pattern}`: {message}")
            }
            Self::ShuttingDown => write!(f, "directory cache is shutting down"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NeverLoaded(err) | Self::RefreshFailed(err) => Some(err),
            Self::InvalidPattern { .. } | Self::ShuttingDown => None,
        }
    }
}

/// Outcome of a successful `ensure_fresh` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The published generation was already up to date.
    Current,
    /// A new generation was built and published.
    Rebuilt,
}

/// Generation-swapping directory tree cache over one record source.
///
/// Reads go against the currently published generation under a short
/// read lock; rebuilds run serialized behind a gate and publish with a
/// single swap, so readers never block on upstream I/O.
pub struct DirectoryCache<S: DirectorySource> {
    source: S,
    check_freshness: bool,
    current: RwLock<Option<Arc<Generation>>>,
    last_signal: Mutex<Option<ChangeSignal>>,
    rebuild_gate: Mutex<()>,
    invalidated: AtomicBool,
    shutting_down: AtomicBool,
}

impl<S: DirectorySource> DirectoryCache<S> {
    /// Creates a cache that re-checks the change signal on every
    /// `ensure_fresh` after the first load.
    pub fn new(source: S) -> Self {
        Self::with_freshness_checking(source, true)
    }

    /// Creates a cache with an explicit freshness policy. With checking
    /// disabled the first successful load is served until `invalidate`.
    pub fn with_freshness_checking(source: S, check_freshness: bool) -> Self {
        Self {
            source,
            check_freshness,
            current: RwLock::new(None),
            last_signal: Mutex::new(None),
            rebuild_gate: Mutex::new(()),
            invalidated: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// The synthetic root directory. Never touches the source.
    pub fn root(&self) -> Arc<Directory> {
        if let Some(generation) = self.current.read().as_ref() {
            return generation.root();
        }
        Arc::new(Directory::root())
    }

    /// Exact full-path lookup after ensuring freshness.
    pub fn get_by_path(&self, path: &str) -> CacheResult<Option<Arc<Directory>>> {
        Ok(self.generation_for_read()?.get_by_path(path))
    }

    /// Exact id lookup after ensuring freshness.
    pub fn get_by_id(&self, id: DbKey) -> CacheResult<Option<Arc<Directory>>> {
        Ok(self.generation_for_read()?.get_by_id(id))
    }

    /// Children of one directory id, stable within a generation.
    pub fn list_children(&self, id: DbKey) -> CacheResult<Vec<Arc<Directory>>> {
        Ok(self.generation_for_read()?.children_of(id))
    }

    /// Searches directory names with `*`/`?` wildcards, optionally among
    /// the children of `parent_path` only, ordered by full path.
    pub fn search(
        &self,
        pattern: &str,
        parent_path: Option<&str>,
    ) -> CacheResult<Vec<Arc<Directory>>> {
        let matcher = compile_wildcard(pattern)?;
        let generation = self.generation_for_read()?;

        let mut matches: Vec<Arc<Directory>> = match parent_path {
            // An absent or empty parent searches the whole tree.
            None | Some("") => generation
                .directories()
                .filter(|dir| matcher.is_match(&dir.name))
                .cloned()
                .collect(),
            Some(path) => {
                let parent_id = if path == ROOT_PATH {
                    ROOT_ID
                } else {
                    match generation.get_by_path(path) {
                        Some(parent) => parent.id,
                        None => return Ok(Vec::new()),
                    }
                };
                generation
                    .children_of(parent_id)
                    .into_iter()
                    .filter(|dir| matcher.is_match(&dir.name))
                    .collect()
            }
        };

        matches.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        Ok(matches)
    }

    /// Loads on first use, then rebuilds only when the change signal
    /// drifts (or after `invalidate`). Idempotent: an unchanged signal
    /// makes this a no-op.
    pub fn ensure_fresh(&self) -> CacheResult<Freshness> {
        let _gate = self.rebuild_gate.lock();

        // Re-check under the gate: a rebuild that just finished on
        // another thread already published the generation we need.
        let has_generation = self.current.read().is_some();
        let invalidated = self.invalidated.load(Ordering::SeqCst);

        if has_generation && !invalidated {
            if !self.check_freshness || self.shutting_down.load(Ordering::SeqCst) {
                return Ok(Freshness::Current);
            }
            let signal = self
                .source
                .fetch_change_signal()
                .map_err(|err| self.rebuild_failure(RebuildError::Fetch(err)))?;
            if self.last_signal.lock().as_ref() == Some(&signal) {
                return Ok(Freshness::Current);
            }
            return self.rebuild(Some(signal));
        }

        if self.shutting_down.load(Ordering::SeqCst) {
            if has_generation {
                return Ok(Freshness::Current);
            }
            return Err(CacheError::ShuttingDown);
        }

        // Signal first, records second: a change landing between the two
        // fetches flips the signal and re-triggers a rebuild next time
        // instead of being masked.
        let signal = if self.check_freshness {
            Some(
                self.source
                    .fetch_change_signal()
                    .map_err(|err| self.rebuild_failure(RebuildError::Fetch(err)))?,
            )
        } else {
            None
        };
        self.rebuild(signal)
    }

    /// Forces the next `ensure_fresh` to rebuild regardless of the
    /// change signal.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
        info!("event=cache_invalidate module=cache status=ok");
    }

    /// Makes any in-flight rebuild abandon its scratch generation and
    /// stops future rebuilds; the published generation stays servable.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        info!("event=cache_shutdown module=cache status=ok");
    }

    fn generation_for_read(&self) -> CacheResult<Arc<Generation>> {
        // A rebuild in flight must not block pure reads: when the gate
        // is held elsewhere and a generation is already published,
        // serve it as-is and let the rebuilder swap when done.
        if self.rebuild_gate.try_lock().is_none() {
            if let Some(generation) = self.current.read().as_ref() {
                return Ok(generation.clone());
            }
        }

        match self.ensure_fresh() {
            Ok(_) => {}
            Err(err) => {
                // Serve the last good generation when one exists; the
                // typed refresh error stays visible via ensure_fresh.
                let guard = self.current.read();
                if let Some(generation) = guard.as_ref() {
                    warn!("event=cache_lookup module=cache status=stale error={err}");
                    return Ok(generation.clone());
                }
                return Err(err);
            }
        }

        let guard = self.current.read();
        match guard.as_ref() {
            Some(generation) => Ok(generation.clone()),
            // ensure_fresh succeeded, so a generation is published.
            None => Err(CacheError::ShuttingDown),
        }
    }

    fn rebuild(&self, signal: Option<ChangeSignal>) -> CacheResult<Freshness> {
        let records = self
            .source
            .fetch_all()
            .map_err(|err| self.rebuild_failure(RebuildError::Fetch(err)))?;
        let record_count = records.len();

        let generation = Generation::build(records)
            .map_err(|err| self.rebuild_failure(RebuildError::Structural(err)))?;

        if self.shutting_down.load(Ordering::SeqCst) {
            info!("event=cache_rebuild module=cache status=abandoned reason=shutdown");
            return Err(CacheError::ShuttingDown);
        }

        *self.current.write() = Some(Arc::new(generation));
        *self.last_signal.lock() = signal;
        self.invalidated.store(false, Ordering::SeqCst);
        info!("event=cache_rebuild module=cache status=ok directories={record_count}");
        Ok(Freshness::Rebuilt)
    }

    fn rebuild_failure(&self, err: RebuildError) -> CacheError {
        if self.current.read().is_some() {
            error!("event=cache_rebuild module=cache status=error recovery=serve_previous error={err}");
            CacheError::RefreshFailed(err)
        } else {
            error!("event=cache_rebuild module=cache status=error recovery=none error={err}");
            CacheError::NeverLoaded(err)
        }
    }
}

fn compile_wildcard(pattern: &str) -> CacheResult<Regex> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');

    Regex::new(&expression).map_err(|err| CacheError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::compile_wildcard;

    #[test]
    fn wildcard_translation_matches_like_the_store() {
        let matcher = compile_wildcard("sc_*_v?").expect("pattern should compile");
        assert!(matcher.is_match("sc_gains_v1"));
        assert!(!matcher.is_match("sc_gains_v10"));
        assert!(!matcher.is_match("xsc_gains_v1"));
    }

    #[test]
    fn wildcard_translation_escapes_regex_metacharacters() {
        let matcher = compile_wildcard("a.b+c").expect("pattern should compile");
        assert!(matcher.is_match("a.b+c"));
        assert!(!matcher.is_match("aXb+c"));
    }
}
