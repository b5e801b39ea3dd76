//! BDD-based analysis of static fault trees
//!
//! [`BddChecker`] owns the BDD encoding of one fault tree and answers the
//! quantitative queries over it: top-event unreliability, the importance
//! measures per basic event, and minimal cut sets.
//!
//! Every measure comes in four shapes: a single event at one timebound, all
//! events at one timebound, one event over a series of timepoints, and all
//! events over a series. The scalar shapes memoise per query in maps keyed
//! on node identity; the caches never outlive one probability assignment.
//! The series shapes run through the chunked vector kernels in
//! [`crate::eval`].

use indexmap::IndexMap;

use faultline_model::FaultTree;

use crate::eval::{self, VectorCache};
use crate::manager::{Bdd, BddManager, NodeId};
use crate::transform::SftTransformer;
use crate::{BddError, BddResult};

/// How a Birnbaum factor combines with the event and top probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measure {
    Birnbaum,
    CriticalityIf,
    DiagnosticIf,
    RiskAchievementWorth,
    RiskReductionWorth,
}

impl Measure {
    /// Combine the event probability `q`, top probability `p` and Birnbaum
    /// factor `b` at one slot.
    fn combine(self, q: f64, p: f64, b: f64) -> f64 {
        match self {
            Measure::Birnbaum => b,
            Measure::CriticalityIf => (q / p) * b,
            Measure::DiagnosticIf => q + (q * (1.0 - q) * b) / p,
            Measure::RiskAchievementWorth => 1.0 + ((1.0 - q) * b) / p,
            Measure::RiskReductionWorth => p / (p - q * b),
        }
    }
}

/// Scalar top-event probability with memoisation on node identity.
///
/// The cache must be empty or stem from an earlier call with the same
/// probability assignment.
fn recursive_probability(
    manager: &BddManager,
    bdd: Bdd,
    probabilities: &IndexMap<u32, f64>,
    cache: &mut IndexMap<NodeId, f64>,
) -> f64 {
    if manager.is_one(bdd) {
        return 1.0;
    }
    if manager.is_zero(bdd) {
        return 0.0;
    }
    if let Some(&probability) = cache.get(&bdd.raw()) {
        return probability;
    }

    let var_probability = probabilities[&manager.top_var(bdd)];
    let then_probability =
        recursive_probability(manager, manager.then_bdd(bdd), probabilities, cache);
    let else_probability =
        recursive_probability(manager, manager.else_bdd(bdd), probabilities, cache);

    // P(ite(x, f1, f0)) = P(x)P(f1) + (1 - P(x))P(f0)
    let probability =
        var_probability * then_probability + (1.0 - var_probability) * else_probability;
    cache.insert(bdd.raw(), probability);
    probability
}

/// Scalar Birnbaum factor of `variable`, reusing the probability cache for
/// the cofactors at the variable's level.
fn recursive_birnbaum_factor(
    manager: &BddManager,
    variable: u32,
    bdd: Bdd,
    probabilities: &IndexMap<u32, f64>,
    probability_cache: &mut IndexMap<NodeId, f64>,
    birnbaum_cache: &mut IndexMap<NodeId, f64>,
) -> f64 {
    if manager.is_terminal(bdd) {
        return 0.0;
    }
    if let Some(&factor) = birnbaum_cache.get(&bdd.raw()) {
        return factor;
    }

    let var = manager.top_var(bdd);
    if var > variable {
        // The variable cannot occur below this level
        return 0.0;
    }

    let factor = if var == variable {
        let then_probability = recursive_probability(
            manager,
            manager.then_bdd(bdd),
            probabilities,
            probability_cache,
        );
        let else_probability = recursive_probability(
            manager,
            manager.else_bdd(bdd),
            probabilities,
            probability_cache,
        );
        then_probability - else_probability
    } else {
        let then_factor = recursive_birnbaum_factor(
            manager,
            variable,
            manager.then_bdd(bdd),
            probabilities,
            probability_cache,
            birnbaum_cache,
        );
        let else_factor = recursive_birnbaum_factor(
            manager,
            variable,
            manager.else_bdd(bdd),
            probabilities,
            probability_cache,
            birnbaum_cache,
        );
        let var_probability = probabilities[&var];
        var_probability * then_factor + (1.0 - var_probability) * else_factor
    };

    birnbaum_cache.insert(bdd.raw(), factor);
    factor
}

fn recursive_mcs(manager: &BddManager, bdd: Bdd, buffer: &mut Vec<u32>, out: &mut Vec<Vec<u32>>) {
    if manager.is_one(bdd) {
        out.push(buffer.clone());
    } else if !manager.is_zero(bdd) {
        buffer.push(manager.top_var(bdd));
        recursive_mcs(manager, manager.then_bdd(bdd), buffer, out);
        buffer.pop();

        recursive_mcs(manager, manager.else_bdd(bdd), buffer, out);
    }
}

/// Analysis engine over the BDD encoding of a static fault tree
pub struct BddChecker<'a> {
    tree: &'a FaultTree,
    manager: BddManager,
    top: Bdd,
}

impl<'a> BddChecker<'a> {
    /// Encode `tree` and prepare the query surface.
    ///
    /// Fails with [`BddError::NotStatic`] when the tree has dynamic
    /// constructs.
    pub fn new(tree: &'a FaultTree) -> BddResult<Self> {
        let mut manager = BddManager::new();
        let top = SftTransformer::new(tree).transform_top_level(&mut manager)?;
        Ok(Self { tree, manager, top })
    }

    pub fn manager(&self) -> &BddManager {
        &self.manager
    }

    /// The BDD of the top-level failure function
    pub fn top_level_bdd(&self) -> Bdd {
        self.top
    }

    fn probabilities_at(&self, timebound: f64) -> IndexMap<u32, f64> {
        self.tree
            .basic_events()
            .map(|be| (self.variable_of_unchecked(&be.name), be.unreliability(timebound)))
            .collect()
    }

    fn variable_of_unchecked(&self, be_name: &str) -> u32 {
        self.manager
            .index_of(be_name)
            .expect("basic event has no registered variable")
    }

    fn variable_of(&self, be_name: &str) -> BddResult<u32> {
        self.manager
            .index_of(be_name)
            .ok_or_else(|| BddError::UnknownBasicEvent(be_name.to_string()))
    }

    // ===== Top-event probability =====

    /// Probability that the top event has occurred by `timebound`
    pub fn probability_at_timebound(&self, timebound: f64) -> f64 {
        let probabilities = self.probabilities_at(timebound);
        let mut cache = IndexMap::new();
        recursive_probability(&self.manager, self.top, &probabilities, &mut cache)
    }

    /// Top-event probabilities over a time series, evaluated in chunks of
    /// `chunksize` (0 means one chunk)
    pub fn probabilities_at_timepoints(&self, timepoints: &[f64], chunksize: usize) -> Vec<f64> {
        let mut cache = VectorCache::new();
        let mut results = Vec::with_capacity(timepoints.len());
        eval::chunk_calculation(
            self.tree,
            &self.manager,
            timepoints,
            chunksize,
            |width, probabilities_by_var| {
                eval::invalidate(&mut cache);
                let key = eval::probabilities(
                    &self.manager,
                    width,
                    self.top,
                    probabilities_by_var,
                    &mut cache,
                );
                results.extend_from_slice(&cache[&key].1[..width]);
            },
        );
        results
    }

    // ===== Importance measures =====

    pub fn birnbaum_at_timebound(&self, be_name: &str, timebound: f64) -> BddResult<f64> {
        self.importance_at_timebound(Measure::Birnbaum, be_name, timebound)
    }

    pub fn all_birnbaums_at_timebound(&self, timebound: f64) -> Vec<f64> {
        self.all_importance_at_timebound(Measure::Birnbaum, timebound)
    }

    pub fn birnbaums_at_timepoints(
        &self,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        self.importance_at_timepoints(Measure::Birnbaum, be_name, timepoints, chunksize)
    }

    pub fn all_birnbaums_at_timepoints(
        &self,
        timepoints: &[f64],
        chunksize: usize,
    ) -> Vec<Vec<f64>> {
        self.all_importance_at_timepoints(Measure::Birnbaum, timepoints, chunksize)
    }

    pub fn cif_at_timebound(&self, be_name: &str, timebound: f64) -> BddResult<f64> {
        self.importance_at_timebound(Measure::CriticalityIf, be_name, timebound)
    }

    pub fn all_cifs_at_timebound(&self, timebound: f64) -> Vec<f64> {
        self.all_importance_at_timebound(Measure::CriticalityIf, timebound)
    }

    pub fn cifs_at_timepoints(
        &self,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        self.importance_at_timepoints(Measure::CriticalityIf, be_name, timepoints, chunksize)
    }

    pub fn all_cifs_at_timepoints(&self, timepoints: &[f64], chunksize: usize) -> Vec<Vec<f64>> {
        self.all_importance_at_timepoints(Measure::CriticalityIf, timepoints, chunksize)
    }

    pub fn dif_at_timebound(&self, be_name: &str, timebound: f64) -> BddResult<f64> {
        self.importance_at_timebound(Measure::DiagnosticIf, be_name, timebound)
    }

    pub fn all_difs_at_timebound(&self, timebound: f64) -> Vec<f64> {
        self.all_importance_at_timebound(Measure::DiagnosticIf, timebound)
    }

    pub fn difs_at_timepoints(
        &self,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        self.importance_at_timepoints(Measure::DiagnosticIf, be_name, timepoints, chunksize)
    }

    pub fn all_difs_at_timepoints(&self, timepoints: &[f64], chunksize: usize) -> Vec<Vec<f64>> {
        self.all_importance_at_timepoints(Measure::DiagnosticIf, timepoints, chunksize)
    }

    pub fn raw_at_timebound(&self, be_name: &str, timebound: f64) -> BddResult<f64> {
        self.importance_at_timebound(Measure::RiskAchievementWorth, be_name, timebound)
    }

    pub fn all_raws_at_timebound(&self, timebound: f64) -> Vec<f64> {
        self.all_importance_at_timebound(Measure::RiskAchievementWorth, timebound)
    }

    pub fn raws_at_timepoints(
        &self,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        self.importance_at_timepoints(
            Measure::RiskAchievementWorth,
            be_name,
            timepoints,
            chunksize,
        )
    }

    pub fn all_raws_at_timepoints(&self, timepoints: &[f64], chunksize: usize) -> Vec<Vec<f64>> {
        self.all_importance_at_timepoints(Measure::RiskAchievementWorth, timepoints, chunksize)
    }

    pub fn rrw_at_timebound(&self, be_name: &str, timebound: f64) -> BddResult<f64> {
        self.importance_at_timebound(Measure::RiskReductionWorth, be_name, timebound)
    }

    pub fn all_rrws_at_timebound(&self, timebound: f64) -> Vec<f64> {
        self.all_importance_at_timebound(Measure::RiskReductionWorth, timebound)
    }

    pub fn rrws_at_timepoints(
        &self,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        self.importance_at_timepoints(Measure::RiskReductionWorth, be_name, timepoints, chunksize)
    }

    pub fn all_rrws_at_timepoints(&self, timepoints: &[f64], chunksize: usize) -> Vec<Vec<f64>> {
        self.all_importance_at_timepoints(Measure::RiskReductionWorth, timepoints, chunksize)
    }

    // ===== Minimal cut sets =====

    /// Minimal cut sets as basic-event names
    pub fn minimal_cut_sets(&mut self) -> Vec<Vec<String>> {
        self.minimal_cut_sets_as_indices()
            .into_iter()
            .map(|cut_set| {
                cut_set
                    .into_iter()
                    .map(|variable| self.manager.name_of(variable).to_string())
                    .collect()
            })
            .collect()
    }

    /// Minimal cut sets as BDD variable indices
    pub fn minimal_cut_sets_as_indices(&mut self) -> Vec<Vec<u32>> {
        let minimal = self.manager.minsol(self.top);
        let mut cut_sets = Vec::new();
        let mut buffer = Vec::new();
        recursive_mcs(&self.manager, minimal, &mut buffer, &mut cut_sets);
        cut_sets
    }

    // ===== Shared measure drivers =====

    fn importance_at_timebound(
        &self,
        measure: Measure,
        be_name: &str,
        timebound: f64,
    ) -> BddResult<f64> {
        let variable = self.variable_of(be_name)?;
        let probabilities = self.probabilities_at(timebound);
        let mut probability_cache = IndexMap::new();
        let mut birnbaum_cache = IndexMap::new();

        let factor = recursive_birnbaum_factor(
            &self.manager,
            variable,
            self.top,
            &probabilities,
            &mut probability_cache,
            &mut birnbaum_cache,
        );
        let top_probability = recursive_probability(
            &self.manager,
            self.top,
            &probabilities,
            &mut probability_cache,
        );
        Ok(measure.combine(probabilities[&variable], top_probability, factor))
    }

    fn all_importance_at_timebound(&self, measure: Measure, timebound: f64) -> Vec<f64> {
        let probabilities = self.probabilities_at(timebound);
        let mut probability_cache = IndexMap::new();
        let top_probability = recursive_probability(
            &self.manager,
            self.top,
            &probabilities,
            &mut probability_cache,
        );

        self.tree
            .basic_events()
            .map(|be| {
                let variable = self.variable_of_unchecked(&be.name);
                let mut birnbaum_cache = IndexMap::new();
                let factor = recursive_birnbaum_factor(
                    &self.manager,
                    variable,
                    self.top,
                    &probabilities,
                    &mut probability_cache,
                    &mut birnbaum_cache,
                );
                measure.combine(probabilities[&variable], top_probability, factor)
            })
            .collect()
    }

    fn importance_at_timepoints(
        &self,
        measure: Measure,
        be_name: &str,
        timepoints: &[f64],
        chunksize: usize,
    ) -> BddResult<Vec<f64>> {
        let variable = self.variable_of(be_name)?;
        let mut probability_cache = VectorCache::new();
        let mut birnbaum_cache = VectorCache::new();
        let mut results = Vec::with_capacity(timepoints.len());

        eval::chunk_calculation(
            self.tree,
            &self.manager,
            timepoints,
            chunksize,
            |width, probabilities_by_var| {
                eval::invalidate(&mut probability_cache);
                eval::invalidate(&mut birnbaum_cache);

                let factor_key = eval::birnbaum_factors(
                    &self.manager,
                    width,
                    variable,
                    self.top,
                    probabilities_by_var,
                    &mut probability_cache,
                    &mut birnbaum_cache,
                );
                let probability_key = eval::probabilities(
                    &self.manager,
                    width,
                    self.top,
                    probabilities_by_var,
                    &mut probability_cache,
                );

                let event = &probabilities_by_var[&variable];
                let factors = &birnbaum_cache[&factor_key].1;
                let top = &probability_cache[&probability_key].1;
                for i in 0..width {
                    results.push(measure.combine(event[i], top[i], factors[i]));
                }
            },
        );
        Ok(results)
    }

    fn all_importance_at_timepoints(
        &self,
        measure: Measure,
        timepoints: &[f64],
        chunksize: usize,
    ) -> Vec<Vec<f64>> {
        let mut probability_cache = VectorCache::new();
        let mut birnbaum_cache = VectorCache::new();
        let mut results = vec![Vec::with_capacity(timepoints.len()); self.tree.basic_event_count()];

        eval::chunk_calculation(
            self.tree,
            &self.manager,
            timepoints,
            chunksize,
            |width, probabilities_by_var| {
                eval::invalidate(&mut probability_cache);
                let probability_key = eval::probabilities(
                    &self.manager,
                    width,
                    self.top,
                    probabilities_by_var,
                    &mut probability_cache,
                );

                for (event_index, be) in self.tree.basic_events().enumerate() {
                    // One traversal per event; the factor cache is only
                    // valid for a single variable
                    eval::invalidate(&mut birnbaum_cache);
                    let variable = self.variable_of_unchecked(&be.name);
                    let factor_key = eval::birnbaum_factors(
                        &self.manager,
                        width,
                        variable,
                        self.top,
                        probabilities_by_var,
                        &mut probability_cache,
                        &mut birnbaum_cache,
                    );

                    let event = &probabilities_by_var[&variable];
                    let factors = &birnbaum_cache[&factor_key].1;
                    let top = &probability_cache[&probability_key].1;
                    for i in 0..width {
                        results[event_index].push(measure.combine(event[i], top[i], factors[i]));
                    }
                }
            },
        );
        results
    }
}
