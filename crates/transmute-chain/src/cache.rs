//! Shared cache of production trees.
//!
//! Trees are keyed by `(root, flux fingerprint)`. Each entry remembers the
//! tolerance and limits it was built with; a request is served from the
//! entry when the entry is at least as precise, otherwise the key is rebuilt
//! and replaced. Builds are single-flight per key: concurrent callers for a
//! missing key wait on one per-key mutex and then read the fresh entry.
//!
//! Reads never take a global lock. `DashMap` guards are always dropped
//! before the map is touched again. A per-key build gate only exists while
//! some caller holds it; the last one out removes it, so the gate map stays
//! empty between requests whatever the number of distinct keys.
//!
//! Invalidation bumps a generation counter. A build that started before
//! the bump still returns its tree but does not insert it, so an
//! invalidated key never comes back from an in-flight build.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, trace, warn};

use transmute_core::{Flux, FluxFingerprint, Nuclide, NuclideDataProvider};

use crate::builder::ChainBuilder;
use crate::config::{BuilderConfig, CacheConfig};
use crate::error::ChainError;
use crate::tree::DecayChainTree;

type Key = (Nuclide, FluxFingerprint);

struct CacheEntry {
    tree: Arc<DecayChainTree>,
    /// Insertion order, for bounded eviction.
    seq: u64,
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Trees expanded by this cache.
    pub builds: u64,
    /// Requests served from an existing entry.
    pub hits: u64,
    /// Entries replaced, by a tighter request or after corruption.
    pub rebuilds: u64,
    /// Cached trees that failed validation.
    pub corruptions: u64,
    pub entries: usize,
}

pub struct ChainCache {
    entries: DashMap<Key, CacheEntry>,
    in_flight: DashMap<Key, Arc<Mutex<()>>>,
    config: CacheConfig,
    seq: AtomicU64,
    /// Bumped by every invalidation.
    generation: AtomicU64,
    builds: AtomicU64,
    hits: AtomicU64,
    rebuilds: AtomicU64,
    corruptions: AtomicU64,
}

impl Default for ChainCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ChainCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            config,
            seq: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            rebuilds: AtomicU64::new(0),
            corruptions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the tree for `nuclide` under `flux`, building it if no cached
    /// entry is precise enough.
    pub fn get_or_build<P: NuclideDataProvider + ?Sized>(
        &self,
        builder: &ChainBuilder<'_, P>,
        nuclide: Nuclide,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<Arc<DecayChainTree>, ChainError> {
        self.fetch(builder, nuclide, flux, tolerance)
            .map(|(tree, _)| tree)
    }

    /// Like [`get_or_build`](Self::get_or_build), also reporting whether
    /// this call expanded the tree.
    pub(crate) fn fetch<P: NuclideDataProvider + ?Sized>(
        &self,
        builder: &ChainBuilder<'_, P>,
        nuclide: Nuclide,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<(Arc<DecayChainTree>, bool), ChainError> {
        let key = (nuclide, flux.fingerprint());
        if let Some(tree) = self.lookup(&key, builder.config(), tolerance) {
            return Ok((tree, false));
        }

        let gate = self.in_flight.entry(key).or_default().value().clone();
        let result = {
            let _guard = gate.lock();
            self.build_locked(builder, key, flux, tolerance)
        };
        drop(gate);
        self.in_flight
            .remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    /// Build and insert under the key's gate.
    fn build_locked<P: NuclideDataProvider + ?Sized>(
        &self,
        builder: &ChainBuilder<'_, P>,
        key: Key,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<(Arc<DecayChainTree>, bool), ChainError> {
        let nuclide = key.0;
        // Another caller may have finished the build while we waited.
        if let Some(tree) = self.lookup(&key, builder.config(), tolerance) {
            return Ok((tree, false));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let tree = builder.expand(nuclide, flux, tolerance)?;
        tree.validate()?;
        self.builds.fetch_add(1, Ordering::Relaxed);
        let tree = Arc::new(tree);

        if !tree.is_complete() {
            debug!(%nuclide, "cache: deadline-truncated tree not cached");
            return Ok((tree, true));
        }

        let entry = CacheEntry {
            tree: Arc::clone(&tree),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        // The shard lock held by `slot` orders this check against the
        // retain pass of any invalidation.
        let slot = self.entries.entry(key);
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(slot);
            debug!(%nuclide, "cache: invalidated during build, not cached");
            return Ok((tree, true));
        }
        match slot {
            Entry::Occupied(mut occupied) => {
                occupied.insert(entry);
                self.rebuilds.fetch_add(1, Ordering::Relaxed);
                debug!(%nuclide, flux = %key.1, tolerance, "cache: replaced entry");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        self.evict_to_bound();
        Ok((tree, true))
    }

    fn lookup(
        &self,
        key: &Key,
        limits: &BuilderConfig,
        tolerance: f64,
    ) -> Option<Arc<DecayChainTree>> {
        let tree = Arc::clone(&self.entries.get(key)?.tree);

        if let Err(err) = tree.validate() {
            error!(nuclide = %key.0, flux = %key.1, %err, "cache: corrupt tree evicted");
            self.entries
                .remove_if(key, |_, entry| Arc::ptr_eq(&entry.tree, &tree));
            self.corruptions.fetch_add(1, Ordering::Relaxed);
            self.rebuilds.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let covers = tree.tolerance() <= tolerance
            && tree.max_depth() >= limits.max_depth
            && tree.max_nodes() >= limits.max_nodes;
        if !covers {
            return None;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(tree)
    }

    fn evict_to_bound(&self) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        while self.entries.len() > max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.seq)
                .map(|entry| *entry.key());
            let Some(key) = oldest else {
                break;
            };
            self.entries.remove(&key);
            trace!(nuclide = %key.0, flux = %key.1, "cache: evicted oldest");
        }
    }

    /// Drop every entry rooted at `nuclide`.
    pub fn invalidate(&self, nuclide: Nuclide) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.retain(|(root, _), _| *root != nuclide);
    }

    /// Drop every entry built under the flux with fingerprint `fp`.
    pub fn invalidate_flux(&self, fp: FluxFingerprint) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.retain(|(_, flux), _| *flux != fp);
    }

    /// Keep only entries built under one of `keep`.
    pub fn retain_fluxes(&self, keep: &[FluxFingerprint]) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.retain(|(_, flux), _| keep.contains(flux));
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of trees this cache has expanded.
    pub fn build_count(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            builds: self.builds.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            corruptions: self.corruptions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Build trees for `nuclides` in parallel. Returns how many are now
    /// available; failures are logged and skipped.
    pub fn prewarm<P: NuclideDataProvider + ?Sized>(
        &self,
        builder: &ChainBuilder<'_, P>,
        nuclides: &[Nuclide],
        flux: &Flux,
        tolerance: f64,
    ) -> usize {
        nuclides
            .par_iter()
            .filter(|&&nuclide| match self.get_or_build(builder, nuclide, flux, tolerance) {
                Ok(_) => true,
                Err(err) => {
                    warn!(%nuclide, %err, "cache: prewarm failed");
                    false
                }
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeStatus;
    use crate::tree::tests::{node, tree_of};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use transmute_core::{DataError, DecayInfo, DecayMode, NuclideLibrary, ReactionRemoval};

    fn nuc(s: &str) -> Nuclide {
        s.parse().unwrap()
    }

    fn library() -> NuclideLibrary {
        NuclideLibrary::new()
            .with_half_life(
                nuc("Bi212"),
                3633.0,
                &[(DecayMode::BetaMinus, 0.64), (DecayMode::Alpha, 0.36)],
            )
            .with_half_life(nuc("Po212"), 2.99e-7, &[(DecayMode::Alpha, 1.0)])
            .with_half_life(nuc("Tl208"), 183.2, &[(DecayMode::BetaMinus, 1.0)])
            .with_half_life(nuc("Co60"), 1.66e8, &[(DecayMode::BetaMinus, 1.0)])
            .with_stable(nuc("Pb208"))
            .with_stable(nuc("Ni60"))
    }

    fn builder(lib: &NuclideLibrary) -> ChainBuilder<'_, NuclideLibrary> {
        ChainBuilder::new(lib, BuilderConfig::default())
    }

    // --- reuse ---

    #[test]
    fn second_request_is_a_hit() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let first = cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        let second = cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn looser_request_reuses_tighter_entry() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-9).unwrap();
        let tree = cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-3).unwrap();
        assert_eq!(tree.tolerance(), 1e-9);
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn tighter_request_rebuilds() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 0.5).unwrap();
        let (tree, built) = cache.fetch(&b, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        assert!(built);
        assert_eq!(tree.tolerance(), 1e-7);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().rebuilds, 1);
    }

    #[test]
    fn deeper_limit_rebuilds() {
        let lib = library();
        let cache = ChainCache::default();
        let shallow = ChainBuilder::new(
            &lib,
            BuilderConfig {
                max_depth: 1,
                ..BuilderConfig::default()
            },
        );
        cache.get_or_build(&shallow, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        cache.get_or_build(&builder(&lib), nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        assert_eq!(cache.build_count(), 2);
        // The deep tree also serves the shallow request.
        cache.get_or_build(&shallow, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn flux_is_part_of_the_key() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        cache.get_or_build(&b, nuc("Co60"), &Flux::zero(), 1e-7).unwrap();
        cache.get_or_build(&b, nuc("Co60"), &Flux::OneGroup(1e14), 1e-7).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.build_count(), 2);
    }

    #[test]
    fn missing_root_is_not_cached() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let err = cache.get_or_build(&b, nuc("U235"), &Flux::zero(), 1e-7).unwrap_err();
        assert_eq!(err, ChainError::NoDecayData(nuc("U235")));
        assert!(cache.is_empty());
        assert_eq!(cache.build_count(), 0);
        assert!(cache.in_flight.is_empty());
    }

    // --- eviction ---

    #[test]
    fn invalidation() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let hot = Flux::OneGroup(1e14);
        for flux in [Flux::zero(), hot.clone()] {
            cache.get_or_build(&b, nuc("Co60"), &flux, 1e-7).unwrap();
            cache.get_or_build(&b, nuc("Bi212"), &flux, 1e-7).unwrap();
        }
        assert_eq!(cache.len(), 4);

        cache.invalidate(nuc("Co60"));
        assert_eq!(cache.len(), 2);

        cache.invalidate_flux(hot.fingerprint());
        assert_eq!(cache.len(), 1);

        cache.get_or_build(&b, nuc("Co60"), &hot, 1e-7).unwrap();
        cache.retain_fluxes(&[hot.fingerprint()]);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn bounded_cache_evicts_oldest() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::new(CacheConfig::bounded(2));
        for n in ["Co60", "Bi212", "Tl208"] {
            cache.get_or_build(&b, nuc(n), &Flux::zero(), 1e-7).unwrap();
        }
        assert_eq!(cache.len(), 2);
        cache.get_or_build(&b, nuc("Co60"), &Flux::zero(), 1e-7).unwrap();
        assert_eq!(cache.build_count(), 4);
    }

    #[test]
    fn gates_do_not_outlive_requests() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::new(CacheConfig::bounded(2));
        let roots = ["Co60", "Bi212", "Tl208", "Po212", "Pb208", "Ni60"];
        for flux in (0..40).map(|i| Flux::OneGroup(1e10 * f64::from(i + 1))) {
            for n in roots {
                cache.get_or_build(&b, nuc(n), &flux, 1e-7).unwrap();
            }
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.build_count(), 240);
        assert!(cache.in_flight.is_empty());

        cache.prewarm(&b, &[nuc("Co60"), nuc("U235")], &Flux::zero(), 1e-7);
        assert!(cache.in_flight.is_empty());
    }

    // --- corruption and deadlines ---

    #[test]
    fn corrupt_entry_is_rebuilt() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let root = nuc("Co60");
        let bad = tree_of(
            root,
            vec![
                node(root, 1e-9, 1.0, 0, None, NodeStatus::Expanded),
                node(nuc("Ni60"), 0.0, 1.5, 1, Some(0), NodeStatus::Stable),
            ],
        );
        cache.entries.insert(
            (root, Flux::zero().fingerprint()),
            CacheEntry {
                tree: Arc::new(bad),
                seq: 0,
            },
        );

        let tree = cache.get_or_build(&b, root, &Flux::zero(), 1e-7).unwrap();
        assert!(tree.validate().is_ok());
        let stats = cache.stats();
        assert_eq!(stats.corruptions, 1);
        assert_eq!(stats.rebuilds, 1);
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn deadline_trees_are_not_cached() {
        let lib = library();
        let b = ChainBuilder::new(
            &lib,
            BuilderConfig {
                deadline: Some(Instant::now() - Duration::from_millis(1)),
                ..BuilderConfig::default()
            },
        );
        let cache = ChainCache::default();
        let tree = cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap();
        assert!(!tree.is_complete());
        assert!(cache.is_empty());
        assert_eq!(cache.build_count(), 1);
    }

    // --- concurrency ---

    #[test]
    fn concurrent_requests_build_once() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let trees: Vec<Arc<DecayChainTree>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.get_or_build(&b, nuc("Bi212"), &Flux::zero(), 1e-7).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(cache.build_count(), 1);
        assert!(trees.iter().all(|t| Arc::ptr_eq(t, &trees[0])));
        assert_eq!(cache.stats().hits, 7);
    }

    /// Blocks the first `decay_info` call until told to resume.
    struct PausedProvider {
        inner: NuclideLibrary,
        started: Mutex<Option<mpsc::Sender<()>>>,
        resume: Mutex<mpsc::Receiver<()>>,
    }

    impl NuclideDataProvider for PausedProvider {
        fn decay_info(&self, nuclide: Nuclide) -> Result<DecayInfo, DataError> {
            let started = self.started.lock().take();
            if let Some(started) = started {
                started.send(()).unwrap();
                self.resume.lock().recv().unwrap();
            }
            self.inner.decay_info(nuclide)
        }

        fn reaction_removal(&self, nuclide: Nuclide, flux: &Flux) -> Result<ReactionRemoval, DataError> {
            self.inner.reaction_removal(nuclide, flux)
        }
    }

    #[test]
    fn invalidation_during_build_is_not_undone() {
        let (started_tx, started_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel();
        let provider = PausedProvider {
            inner: library(),
            started: Mutex::new(Some(started_tx)),
            resume: Mutex::new(resume_rx),
        };
        let b = ChainBuilder::new(&provider, BuilderConfig::default());
        let cache = ChainCache::default();
        let root = nuc("Co60");
        let key = (root, Flux::zero().fingerprint());

        std::thread::scope(|s| {
            let build = s.spawn(|| cache.fetch(&b, root, &Flux::zero(), 1e-7).unwrap());
            started_rx.recv().unwrap();
            assert!(cache.in_flight.contains_key(&key));
            cache.invalidate(root);
            // The gate survives invalidation, so a second caller still waits.
            assert!(cache.in_flight.contains_key(&key));
            resume_tx.send(()).unwrap();
            let (tree, built) = build.join().unwrap();
            assert!(built);
            assert!(tree.is_complete());
        });

        // The caller got its tree, but the cache holds nothing stale.
        assert!(cache.is_empty());
        assert!(cache.in_flight.is_empty());
        cache.get_or_build(&b, root, &Flux::zero(), 1e-7).unwrap();
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn build_after_invalidation_is_cached() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        cache.get_or_build(&b, nuc("Co60"), &Flux::zero(), 1e-7).unwrap();
        cache.clear();
        cache.get_or_build(&b, nuc("Co60"), &Flux::zero(), 1e-7).unwrap();
        cache.get_or_build(&b, nuc("Co60"), &Flux::zero(), 1e-7).unwrap();
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn prewarm_counts_successes() {
        let lib = library();
        let b = builder(&lib);
        let cache = ChainCache::default();
        let roots = [nuc("Co60"), nuc("Bi212"), nuc("U235")];
        assert_eq!(cache.prewarm(&b, &roots, &Flux::zero(), 1e-7), 2);
        assert_eq!(cache.len(), 2);
    }
}
