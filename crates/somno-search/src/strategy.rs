use crate::engine::{best_trial, TrialResult};
use crate::space::{ParamSet, SearchSpace};
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Proposes the next parameter set given every trial evaluated so far.
pub trait SearchStrategy {
    fn name(&self) -> &'static str;
    fn propose(&mut self, space: &SearchSpace, history: &[TrialResult]) -> ParamSet;
}

pub struct RandomSearch {
    rng: StdRng,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "random"
    }

    fn propose(&mut self, space: &SearchSpace, _history: &[TrialResult]) -> ParamSet {
        space.sample(&mut self.rng)
    }
}

/// Walks the cartesian grid in order and starts over once it runs out.
pub struct GridSearch {
    levels: usize,
    points: Vec<ParamSet>,
    cursor: usize,
}

impl GridSearch {
    pub fn new(levels: usize) -> Self {
        Self {
            levels,
            points: Vec::new(),
            cursor: 0,
        }
    }
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn propose(&mut self, space: &SearchSpace, _history: &[TrialResult]) -> ParamSet {
        if self.points.is_empty() {
            self.points = space.grid(self.levels);
            info!("grid has {} points", self.points.len());
        }
        if self.points.is_empty() {
            return ParamSet::new();
        }
        if self.cursor == self.points.len() {
            info!("grid exhausted, starting over");
            self.cursor = 0;
        }
        let point = self.points[self.cursor].clone();
        self.cursor += 1;
        point
    }
}

/// Random warm-up, then mostly local moves around the best completed trial.
///
/// After `warmup` completed trials each proposal is a fresh sample with
/// probability `explore` and a mutation of the incumbent otherwise.
pub struct AdaptiveSearch {
    warmup: usize,
    explore: f64,
    rng: StdRng,
}

impl AdaptiveSearch {
    pub fn new(warmup: usize, explore: f64, seed: u64) -> Self {
        Self {
            warmup,
            explore: explore.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn mutate(&mut self, space: &SearchSpace, best: &ParamSet) -> ParamSet {
        let mut params = best.clone();
        let active: Vec<_> = space
            .params()
            .iter()
            .filter(|param| params.contains_key(&param.name))
            .collect();
        if active.is_empty() {
            return space.sample(&mut self.rng);
        }
        let forced = self.rng.gen_range(0..active.len());
        let rate = 1.0 / active.len() as f64;
        for (idx, param) in active.into_iter().enumerate() {
            if idx != forced && !self.rng.gen_bool(rate) {
                continue;
            }
            if let Some(value) = params.get(&param.name) {
                let moved = param.domain.perturb(value, &mut self.rng);
                params.insert(param.name.clone(), moved);
            }
        }
        space.repair(&mut params, &mut self.rng);
        params
    }
}

impl SearchStrategy for AdaptiveSearch {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn propose(&mut self, space: &SearchSpace, history: &[TrialResult]) -> ParamSet {
        let completed: Vec<TrialResult> = history
            .iter()
            .filter(|trial| trial.is_completed())
            .cloned()
            .collect();
        if completed.len() < self.warmup || self.rng.gen_bool(self.explore) {
            return space.sample(&mut self.rng);
        }
        match best_trial(&completed) {
            Some(best) => {
                debug!("mutating trial {} (error {:.4})", best.trial, best.error);
                let params = best.params.clone();
                self.mutate(space, &params)
            }
            None => space.sample(&mut self.rng),
        }
    }
}
