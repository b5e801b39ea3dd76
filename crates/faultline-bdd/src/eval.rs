//! Chunked vector evaluation
//!
//! Batches a time series into fixed-width chunks, precomputes per-event
//! probability vectors per chunk, and runs the vectorised traversal kernels
//! over them. The per-node caches map a node id to `(valid, values)`; a
//! chunk boundary clears every valid flag but keeps the entries, so their
//! storage is reused across chunks.
//!
//! Kernels return the node id of a valid cache entry instead of a reference
//! into the cache, so recursive sub-computations may keep inserting while
//! callers look results up afterwards.

use indexmap::IndexMap;

use faultline_model::{BasicEventKind, FaultTree};

use crate::manager::{Bdd, BddManager, NodeId};

/// Per-node memoisation for one vector traversal
pub(crate) type VectorCache = IndexMap<NodeId, (bool, Vec<f64>)>;

/// Clear every valid flag, keeping the allocated entries
pub(crate) fn invalidate(cache: &mut VectorCache) {
    for entry in cache.values_mut() {
        entry.0 = false;
    }
}

/// Slice `timepoints` into chunks of `chunksize` (0 means one chunk) and
/// call `func` with each chunk's width and per-variable probability vectors.
pub(crate) fn chunk_calculation<F>(
    tree: &FaultTree,
    manager: &BddManager,
    timepoints: &[f64],
    chunksize: usize,
    mut func: F,
) where
    F: FnMut(usize, &IndexMap<u32, Vec<f64>>),
{
    if timepoints.is_empty() {
        return;
    }
    let chunksize = if chunksize == 0 {
        timepoints.len()
    } else {
        chunksize
    };

    let mut probabilities_by_var: IndexMap<u32, Vec<f64>> = IndexMap::new();
    for chunk in timepoints.chunks(chunksize) {
        for be in tree.basic_events() {
            let variable = manager
                .index_of(&be.name)
                .expect("basic event has no registered variable");
            let values = match be.kind {
                // Exponential events vectorise directly
                BasicEventKind::Exponential { active_rate, .. } => chunk
                    .iter()
                    .map(|&t| 1.0 - (-active_rate * t).exp())
                    .collect(),
                // Everything else goes through the generic unreliability
                _ => chunk.iter().map(|&t| be.unreliability(t)).collect(),
            };
            probabilities_by_var.insert(variable, values);
        }
        func(chunk.len(), &probabilities_by_var);
    }
}

fn store_constant(cache: &mut VectorCache, key: NodeId, chunksize: usize, value: f64) {
    let entry = cache.entry(key).or_insert_with(|| (false, Vec::new()));
    entry.1.clear();
    entry.1.resize(chunksize, value);
    entry.0 = true;
}

/// Take an entry's storage for refilling, reusing its allocation
fn take_storage(cache: &mut VectorCache, key: NodeId) -> Vec<f64> {
    let mut values = cache
        .get_mut(&key)
        .map(|entry| std::mem::take(&mut entry.1))
        .unwrap_or_default();
    values.clear();
    values
}

/// Vectorised top-event probability; returns the key of a valid cache entry.
pub(crate) fn probabilities(
    manager: &BddManager,
    chunksize: usize,
    bdd: Bdd,
    probabilities_by_var: &IndexMap<u32, Vec<f64>>,
    cache: &mut VectorCache,
) -> NodeId {
    let key = bdd.raw();
    if let Some((valid, _)) = cache.get(&key) {
        if *valid {
            return key;
        }
    }

    if manager.is_one(bdd) {
        store_constant(cache, key, chunksize, 1.0);
        return key;
    }
    if manager.is_zero(bdd) {
        store_constant(cache, key, chunksize, 0.0);
        return key;
    }

    let then_key = probabilities(
        manager,
        chunksize,
        manager.then_bdd(bdd),
        probabilities_by_var,
        cache,
    );
    let else_key = probabilities(
        manager,
        chunksize,
        manager.else_bdd(bdd),
        probabilities_by_var,
        cache,
    );

    let var_probabilities = &probabilities_by_var[&manager.top_var(bdd)];
    let mut values = take_storage(cache, key);
    {
        let then_values = &cache[&then_key].1;
        let else_values = &cache[&else_key].1;
        for i in 0..chunksize {
            values.push(
                var_probabilities[i] * then_values[i]
                    + (1.0 - var_probabilities[i]) * else_values[i],
            );
        }
    }
    cache.insert(key, (true, values));
    key
}

/// Vectorised Birnbaum factors of `variable`; returns the key of a valid
/// entry in `birnbaum_cache`.
pub(crate) fn birnbaum_factors(
    manager: &BddManager,
    chunksize: usize,
    variable: u32,
    bdd: Bdd,
    probabilities_by_var: &IndexMap<u32, Vec<f64>>,
    probability_cache: &mut VectorCache,
    birnbaum_cache: &mut VectorCache,
) -> NodeId {
    let key = bdd.raw();
    if let Some((valid, _)) = birnbaum_cache.get(&key) {
        if *valid {
            return key;
        }
    }

    // Below the variable in the order it cannot occur any more
    if manager.is_terminal(bdd) || manager.top_var(bdd) > variable {
        store_constant(birnbaum_cache, key, chunksize, 0.0);
        return key;
    }

    let var = manager.top_var(bdd);
    if var == variable {
        let then_key = probabilities(
            manager,
            chunksize,
            manager.then_bdd(bdd),
            probabilities_by_var,
            probability_cache,
        );
        let else_key = probabilities(
            manager,
            chunksize,
            manager.else_bdd(bdd),
            probabilities_by_var,
            probability_cache,
        );
        let mut values = take_storage(birnbaum_cache, key);
        {
            let then_values = &probability_cache[&then_key].1;
            let else_values = &probability_cache[&else_key].1;
            for i in 0..chunksize {
                values.push(then_values[i] - else_values[i]);
            }
        }
        birnbaum_cache.insert(key, (true, values));
        return key;
    }

    // var < variable
    let then_key = birnbaum_factors(
        manager,
        chunksize,
        variable,
        manager.then_bdd(bdd),
        probabilities_by_var,
        probability_cache,
        birnbaum_cache,
    );
    let else_key = birnbaum_factors(
        manager,
        chunksize,
        variable,
        manager.else_bdd(bdd),
        probabilities_by_var,
        probability_cache,
        birnbaum_cache,
    );

    let var_probabilities = &probabilities_by_var[&var];
    let mut values = take_storage(birnbaum_cache, key);
    {
        let then_values = &birnbaum_cache[&then_key].1;
        let else_values = &birnbaum_cache[&else_key].1;
        for i in 0..chunksize {
            values.push(
                var_probabilities[i] * then_values[i]
                    + (1.0 - var_probabilities[i]) * else_values[i],
            );
        }
    }
    birnbaum_cache.insert(key, (true, values));
    key
}
