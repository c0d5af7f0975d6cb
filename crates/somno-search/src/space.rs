use crate::error::SearchError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use somno_lib::features::BandDivisions;
use somno_lib::models::{Kernel, SplitCriterion};
use somno_lib::pipeline::{ClassifierKind, Normalizer, PipelineConfiguration, Reduction};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Categorical(String),
}

/// Values chosen for the active parameters of one trial, keyed by name.
pub type ParamSet = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ParamDomain {
    Int { low: i64, high: i64, log: bool },
    Float { low: f64, high: f64, log: bool },
    Categorical(Vec<String>),
}

// numeric axes are sampled and stepped in this space
fn forward(value: f64, log: bool) -> f64 {
    if log {
        value.ln()
    } else {
        value
    }
}

fn inverse(value: f64, log: bool) -> f64 {
    if log {
        value.exp()
    } else {
        value
    }
}

impl ParamDomain {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParamDomain::Int { low, high, log } => {
                if high <= low {
                    return ParamValue::Int(*low);
                }
                // widen by one so the top integer gets its share of the range
                let lo = forward(*low as f64, *log);
                let hi = forward(*high as f64 + 1.0, *log);
                let value = inverse(rng.gen_range(lo..hi), *log).floor() as i64;
                ParamValue::Int(value.clamp(*low, *high))
            }
            ParamDomain::Float { low, high, log } => {
                if high <= low {
                    return ParamValue::Float(*low);
                }
                let t = rng.gen_range(forward(*low, *log)..forward(*high, *log));
                ParamValue::Float(inverse(t, *log).clamp(*low, *high))
            }
            ParamDomain::Categorical(choices) => ParamValue::Categorical(
                choices.choose(rng).cloned().unwrap_or_default(),
            ),
        }
    }

    /// Move `value` a random step of up to a quarter of the axis; choices are redrawn.
    pub fn perturb<R: Rng + ?Sized>(&self, value: &ParamValue, rng: &mut R) -> ParamValue {
        match (self, value) {
            (ParamDomain::Int { low, high, log }, ParamValue::Int(current)) => {
                let (lo, hi) = (forward(*low as f64, *log), forward(*high as f64, *log));
                let step = 0.25 * (hi - lo) * rng.gen_range(-1.0_f64..=1.0);
                let t = (forward(*current as f64, *log) + step).clamp(lo, hi);
                ParamValue::Int((inverse(t, *log).round() as i64).clamp(*low, *high))
            }
            (ParamDomain::Float { low, high, log }, ParamValue::Float(current)) => {
                let (lo, hi) = (forward(*low, *log), forward(*high, *log));
                let step = 0.25 * (hi - lo) * rng.gen_range(-1.0_f64..=1.0);
                let t = (forward(*current, *log) + step).clamp(lo, hi);
                ParamValue::Float(inverse(t, *log).clamp(*low, *high))
            }
            _ => self.sample(rng),
        }
    }

    /// At most `levels` evenly spaced points per numeric axis, every choice otherwise.
    pub fn grid(&self, levels: usize) -> Vec<ParamValue> {
        let levels = levels.max(1);
        let positions = |lo: f64, hi: f64| -> Vec<f64> {
            if levels == 1 {
                return vec![lo];
            }
            (0..levels)
                .map(|i| lo + (hi - lo) * i as f64 / (levels - 1) as f64)
                .collect()
        };
        match self {
            ParamDomain::Int { low, high, log } => {
                if ((high - low + 1).max(1) as usize) <= levels {
                    return (*low..=*high).map(ParamValue::Int).collect();
                }
                let mut values: Vec<i64> = positions(
                    forward(*low as f64, *log),
                    forward(*high as f64, *log),
                )
                .into_iter()
                .map(|t| (inverse(t, *log).round() as i64).clamp(*low, *high))
                .collect();
                values.dedup();
                values.into_iter().map(ParamValue::Int).collect()
            }
            ParamDomain::Float { low, high, log } => {
                positions(forward(*low, *log), forward(*high, *log))
                    .into_iter()
                    .map(|t| ParamValue::Float(inverse(t, *log).clamp(*low, *high)))
                    .collect()
            }
            ParamDomain::Categorical(choices) => choices
                .iter()
                .cloned()
                .map(ParamValue::Categorical)
                .collect(),
        }
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamDomain::Int { low, high, .. }, ParamValue::Int(v)) => low <= v && v <= high,
            (ParamDomain::Float { low, high, .. }, ParamValue::Float(v)) => low <= v && v <= high,
            (ParamDomain::Categorical(choices), ParamValue::Categorical(v)) => choices.contains(v),
            _ => false,
        }
    }
}

/// Parameter that only exists when `parent` took one of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub parent: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub domain: ParamDomain,
    pub condition: Option<Condition>,
}

impl ParamSpec {
    pub fn int(name: &str, low: i64, high: i64, log: bool) -> Self {
        Self::with_domain(name, ParamDomain::Int { low, high, log })
    }

    pub fn float(name: &str, low: f64, high: f64, log: bool) -> Self {
        Self::with_domain(name, ParamDomain::Float { low, high, log })
    }

    pub fn categorical(name: &str, choices: &[&str]) -> Self {
        Self::with_domain(
            name,
            ParamDomain::Categorical(choices.iter().map(|c| c.to_string()).collect()),
        )
    }

    fn with_domain(name: &str, domain: ParamDomain) -> Self {
        Self {
            name: name.to_string(),
            domain,
            condition: None,
        }
    }

    pub fn when(self, parent: &str, value: &str) -> Self {
        self.when_any(parent, &[value])
    }

    pub fn when_any(mut self, parent: &str, values: &[&str]) -> Self {
        self.condition = Some(Condition {
            parent: parent.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Absent parents make the parameter inactive, so conditions chain.
    pub fn is_active(&self, params: &ParamSet) -> bool {
        match &self.condition {
            None => true,
            Some(condition) => matches!(
                params.get(&condition.parent),
                Some(ParamValue::Categorical(value)) if condition.values.contains(value)
            ),
        }
    }
}

/// Ordered parameter list; a condition may only name a parameter listed before it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    params: Vec<ParamSpec>,
}

impl SearchSpace {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Band divisions, an optional reduction and one of three classifiers.
    ///
    /// `fold_size` caps the neighbour count and `min_features` the number of
    /// components, the feature width under the coarsest band divisions.
    pub fn sleep_stage(fold_size: usize, min_features: usize) -> Self {
        let fold_size = fold_size.max(1) as i64;
        let min_features = min_features.max(1) as i64;
        Self::new(vec![
            ParamSpec::int("alpha_divs", 1, 2, false),
            ParamSpec::int("beta_divs", 1, 4, false),
            ParamSpec::int("gamma_divs", 1, 5, false),
            ParamSpec::categorical("reduction", &["none", "pca", "svd"]),
            ParamSpec::int("components", 1, min_features, false)
                .when_any("reduction", &["pca", "svd"]),
            ParamSpec::categorical("classifier", &["knn", "svm", "random_forest"]),
            ParamSpec::int("n_neighbors", 1, fold_size, true).when("classifier", "knn"),
            ParamSpec::categorical("svm_kernel", &["linear", "rbf"]).when("classifier", "svm"),
            ParamSpec::float("svm_c", 1e-2, 1e2, true).when("classifier", "svm"),
            ParamSpec::float("svm_gamma", 1e-3, 1.0, true).when("svm_kernel", "rbf"),
            ParamSpec::int("n_estimators", 10, 200, true).when("classifier", "random_forest"),
            ParamSpec::categorical("criterion", &["gini", "entropy"])
                .when("classifier", "random_forest"),
            ParamSpec::int("max_depth", 2, 32, true).when("classifier", "random_forest"),
        ])
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        let mut params = ParamSet::new();
        self.repair(&mut params, rng);
        params
    }

    /// Fill newly activated parameters and drop the ones whose condition no longer holds.
    pub fn repair<R: Rng + ?Sized>(&self, params: &mut ParamSet, rng: &mut R) {
        for param in &self.params {
            if !param.is_active(params) {
                params.remove(&param.name);
                continue;
            }
            let valid = params
                .get(&param.name)
                .is_some_and(|value| param.domain.contains(value));
            if !valid {
                params.insert(param.name.clone(), param.domain.sample(rng));
            }
        }
    }

    /// Cartesian product over every active combination, in declaration order.
    pub fn grid(&self, levels: usize) -> Vec<ParamSet> {
        let mut out = Vec::new();
        self.expand(0, ParamSet::new(), levels, &mut out);
        out
    }

    fn expand(&self, idx: usize, current: ParamSet, levels: usize, out: &mut Vec<ParamSet>) {
        let Some(param) = self.params.get(idx) else {
            out.push(current);
            return;
        };
        if !param.is_active(&current) {
            self.expand(idx + 1, current, levels, out);
            return;
        }
        for value in param.domain.grid(levels) {
            let mut next = current.clone();
            next.insert(param.name.clone(), value);
            self.expand(idx + 1, next, levels, out);
        }
    }
}

fn get<'a>(params: &'a ParamSet, name: &str) -> Result<&'a ParamValue, SearchError> {
    params
        .get(name)
        .ok_or_else(|| SearchError::MissingParameter(name.to_string()))
}

fn get_count(params: &ParamSet, name: &str) -> Result<usize, SearchError> {
    match get(params, name)? {
        ParamValue::Int(value) => usize::try_from(*value).map_err(|_| SearchError::WrongType {
            name: name.to_string(),
        }),
        _ => Err(SearchError::WrongType {
            name: name.to_string(),
        }),
    }
}

fn get_float(params: &ParamSet, name: &str) -> Result<f64, SearchError> {
    match get(params, name)? {
        ParamValue::Float(value) => Ok(*value),
        ParamValue::Int(value) => Ok(*value as f64),
        _ => Err(SearchError::WrongType {
            name: name.to_string(),
        }),
    }
}

fn get_choice<'a>(params: &'a ParamSet, name: &str) -> Result<&'a str, SearchError> {
    match get(params, name)? {
        ParamValue::Categorical(value) => Ok(value),
        _ => Err(SearchError::WrongType {
            name: name.to_string(),
        }),
    }
}

fn unknown(name: &str, value: &str) -> SearchError {
    SearchError::UnknownChoice {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Turn a parameter set drawn from [`SearchSpace::sleep_stage`] into a pipeline.
pub fn decode(params: &ParamSet) -> Result<PipelineConfiguration, SearchError> {
    let divisions = BandDivisions {
        alpha: get_count(params, "alpha_divs")?,
        beta: get_count(params, "beta_divs")?,
        gamma: get_count(params, "gamma_divs")?,
    };
    let reduction = match get_choice(params, "reduction")? {
        "none" => Reduction::None,
        "pca" => Reduction::Pca {
            components: get_count(params, "components")?,
        },
        "svd" => Reduction::TruncatedSvd {
            components: get_count(params, "components")?,
        },
        other => return Err(unknown("reduction", other)),
    };
    let classifier = match get_choice(params, "classifier")? {
        "knn" => ClassifierKind::Knn {
            neighbors: get_count(params, "n_neighbors")?,
        },
        "svm" => {
            let kernel = match get_choice(params, "svm_kernel")? {
                "linear" => Kernel::Linear,
                "rbf" => Kernel::Rbf {
                    gamma: get_float(params, "svm_gamma")?,
                },
                other => return Err(unknown("svm_kernel", other)),
            };
            ClassifierKind::Svm {
                kernel,
                c: get_float(params, "svm_c")?,
            }
        }
        "random_forest" => ClassifierKind::RandomForest {
            n_estimators: get_count(params, "n_estimators")?,
            criterion: match get_choice(params, "criterion")? {
                "gini" => SplitCriterion::Gini,
                "entropy" => SplitCriterion::Entropy,
                other => return Err(unknown("criterion", other)),
            },
            max_depth: get_count(params, "max_depth")?,
        },
        other => return Err(unknown("classifier", other)),
    };
    Ok(PipelineConfiguration {
        divisions,
        normalizer: Normalizer::Standard,
        reduction,
        classifier,
    })
}
