//! Rule normalization and indexing.
//!
//! This module holds the *static* side of the engine: the rule list as it is
//! accepted from configuration, and the normalized form the rewriter reads.
//!
//! The engine is split into two phases:
//!
//! 1. **Build** (this module, driven by `WordManagerBuilder`): layer names are
//!    resolved to ranks, outcomes are normalized to one canonical shape, and
//!    every rule is indexed by its layer.
//! 2. **Run** (see `rewriter.rs`): the registry is frozen behind an `Rc` and
//!    only read.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `Registry::rules`. Registration order is the
//!   only priority there is.
//! - `Registry::by_layer[l]` lists the ids of the rules bound to layer `l` in
//!   ascending order, so a scan can resume "after rule `i`" with a binary
//!   search.
//! - `Rule::weights` is aligned with the candidate list.

use std::rc::Rc;

use crate::{Condition, Error, Predicate, Result, Segment};

/// Rule identifier (index into the registry, in registration order).
pub type RuleId = usize;

/// What a firing rule does to its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Replace the value in place at the same layer.
    Transform,
    /// Seed the next layer with the selected value.
    Promote,
    /// Seed the next layer with a nested sequence that re-enters the pipeline.
    Expand,
}

/// One candidate result of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Segment(Segment),
    Sequence(Vec<Segment>),
}

impl From<Segment> for Outcome {
    fn from(s: Segment) -> Self {
        Outcome::Segment(s)
    }
}

impl From<Vec<Segment>> for Outcome {
    fn from(v: Vec<Segment>) -> Self {
        Outcome::Sequence(v)
    }
}

/// Outcomes as supplied by configuration: a plain list (uniform weight) or an
/// ordered candidate → weight mapping.
#[derive(Debug, Clone)]
pub enum OutcomeSpec {
    List(Vec<Outcome>),
    Weighted(Vec<(Outcome, f64)>),
}

impl Default for OutcomeSpec {
    fn default() -> Self {
        OutcomeSpec::List(Vec::new())
    }
}

impl From<Vec<Outcome>> for OutcomeSpec {
    fn from(v: Vec<Outcome>) -> Self {
        OutcomeSpec::List(v)
    }
}

impl From<Vec<Segment>> for OutcomeSpec {
    fn from(v: Vec<Segment>) -> Self {
        OutcomeSpec::List(v.into_iter().map(Outcome::Segment).collect())
    }
}

impl From<Vec<Vec<Segment>>> for OutcomeSpec {
    fn from(v: Vec<Vec<Segment>>) -> Self {
        OutcomeSpec::List(v.into_iter().map(Outcome::Sequence).collect())
    }
}

impl From<Vec<(Outcome, f64)>> for OutcomeSpec {
    fn from(v: Vec<(Outcome, f64)>) -> Self {
        OutcomeSpec::Weighted(v)
    }
}

/// A rule as handed to `WordManagerBuilder::add_rule`.
#[derive(Debug, Clone)]
pub struct RuleConfig {
    pub layer: String,
    pub trigger: Predicate,
    /// Environment precondition; `None` means "always".
    pub condition: Option<Condition>,
    pub action: Action,
    pub outcomes: OutcomeSpec,
    pub reason: String,
}

/// Normalized candidates. Transform and promote pick a segment, expand picks
/// a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Candidates {
    Segments(Vec<Segment>),
    Sequences(Vec<Vec<Segment>>),
}

/// A registered rule. Immutable once in the registry.
#[derive(Debug)]
pub(crate) struct Rule {
    pub layer: usize,
    pub trigger: Predicate,
    pub condition: Rc<Condition>,
    pub action: Action,
    pub candidates: Candidates,
    pub weights: Vec<f64>,
    pub reason: String,
}

/// Ordered layer names; the position of a name is its rank.
#[derive(Debug, Clone)]
pub(crate) struct Layers {
    names: Vec<String>,
}

impl Layers {
    pub(crate) fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if out.contains(&name) {
                return Err(Error::DuplicateLayer(name));
            }
            out.push(name);
        }
        if out.is_empty() {
            return Err(Error::NoLayers);
        }
        Ok(Layers { names: out })
    }

    pub(crate) fn rank(&self, name: &str) -> Result<usize> {
        self.names.iter().position(|n| n == name).ok_or_else(|| Error::UnknownLayer(name.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }
}

/// Frozen, indexed rule set.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    rules: Vec<Rule>,
    by_layer: Vec<Vec<RuleId>>,
}

impl Registry {
    pub(crate) fn new(layer_count: usize) -> Self {
        Registry { rules: Vec::new(), by_layer: vec![Vec::new(); layer_count] }
    }

    /// Normalize `config` and append it. The returned id is its priority.
    pub(crate) fn add(&mut self, layers: &Layers, config: RuleConfig) -> Result<RuleId> {
        let rule = compile(layers, config)?;
        let id = self.rules.len();
        self.by_layer[rule.layer].push(id);
        self.rules.push(rule);
        Ok(id)
    }

    pub(crate) fn get(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    /// Ids of the rules bound to `layer` with an id of at least `from`.
    pub(crate) fn layer_rules_from(&self, layer: usize, from: RuleId) -> &[RuleId] {
        let ids = &self.by_layer[layer];
        &ids[ids.partition_point(|&id| id < from)..]
    }
}

fn compile(layers: &Layers, config: RuleConfig) -> Result<Rule> {
    let RuleConfig { layer, trigger, condition, action, outcomes, reason } = config;
    let rank = layers.rank(&layer)?;

    if action != Action::Transform && rank + 1 >= layers.len() {
        return Err(Error::InvalidRule(format!("`{reason}`: cannot leave the last layer `{layer}`")));
    }

    let (outcomes, weights): (Vec<Outcome>, Vec<f64>) = match outcomes {
        OutcomeSpec::List(list) => {
            let n = list.len();
            (list, vec![1.0; n])
        }
        OutcomeSpec::Weighted(pairs) => pairs.into_iter().unzip(),
    };

    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(Error::InvalidRule(format!("`{reason}`: weights must be finite and non-negative")));
    }
    if !weights.is_empty() && weights.iter().sum::<f64>() <= 0.0 {
        return Err(Error::InvalidRule(format!("`{reason}`: weights sum to zero")));
    }

    let candidates = match action {
        Action::Transform | Action::Promote => {
            let mut segments = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                match outcome {
                    Outcome::Segment(s) => segments.push(s),
                    Outcome::Sequence(_) => {
                        return Err(Error::InvalidRule(format!(
                            "`{reason}`: only expand rules can produce sequences"
                        )));
                    }
                }
            }
            // An empty promote carries the current value forward.
            if action == Action::Transform && segments.is_empty() {
                return Err(Error::InvalidRule(format!("`{reason}`: transform needs at least one outcome")));
            }
            Candidates::Segments(segments)
        }
        Action::Expand => {
            if outcomes.is_empty() {
                return Err(Error::InvalidRule(format!("`{reason}`: expand needs at least one outcome")));
            }
            Candidates::Sequences(
                outcomes
                    .into_iter()
                    .map(|o| match o {
                        Outcome::Segment(s) => vec![s],
                        Outcome::Sequence(v) => v,
                    })
                    .collect(),
            )
        }
    };

    Ok(Rule {
        layer: rank,
        trigger,
        condition: Rc::new(condition.unwrap_or_default()),
        action,
        candidates,
        weights,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> Layers {
        Layers::new(["underlying", "phonic"]).unwrap()
    }

    fn config(layer: &str, action: Action, outcomes: OutcomeSpec) -> RuleConfig {
        RuleConfig {
            layer: layer.to_string(),
            trigger: Predicate::Any,
            condition: None,
            action,
            outcomes,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn unknown_layer_is_a_configuration_error() {
        let mut reg = Registry::new(2);
        let err = reg.add(&layers(), config("surface", Action::Transform, vec![Segment::vowel("a")].into()));
        assert_eq!(err.unwrap_err(), Error::UnknownLayer("surface".to_string()));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn list_outcomes_get_uniform_weights() {
        let mut reg = Registry::new(2);
        let id = reg
            .add(&layers(), config("underlying", Action::Transform, vec![Segment::vowel("a"), Segment::vowel("e")].into()))
            .unwrap();
        let rule = reg.get(id);
        assert_eq!(rule.weights, vec![1.0, 1.0]);
        assert!(matches!(*rule.condition, Condition::Always));
    }

    #[test]
    fn weighted_outcomes_keep_their_order() {
        let mut reg = Registry::new(2);
        let spec = OutcomeSpec::Weighted(vec![
            (Outcome::Segment(Segment::vowel("i")), 3.0),
            (Outcome::Segment(Segment::vowel("e")), 1.0),
        ]);
        let id = reg.add(&layers(), config("underlying", Action::Promote, spec)).unwrap();
        let rule = reg.get(id);
        assert_eq!(rule.weights, vec![3.0, 1.0]);
        assert_eq!(rule.candidates, Candidates::Segments(vec![Segment::vowel("i"), Segment::vowel("e")]));
    }

    #[test]
    fn expand_wraps_single_segments() {
        let mut reg = Registry::new(2);
        let id = reg.add(&layers(), config("underlying", Action::Expand, vec![Segment::vowel("a")].into())).unwrap();
        assert_eq!(reg.get(id).candidates, Candidates::Sequences(vec![vec![Segment::vowel("a")]]));
    }

    #[test]
    fn rejects_bad_shapes() {
        let mut reg = Registry::new(2);
        let l = layers();
        assert!(reg.add(&l, config("phonic", Action::Promote, OutcomeSpec::default())).is_err());
        assert!(reg.add(&l, config("underlying", Action::Transform, OutcomeSpec::default())).is_err());
        assert!(reg.add(&l, config("underlying", Action::Transform, vec![vec![Segment::vowel("a")]].into())).is_err());
        let zero = OutcomeSpec::Weighted(vec![(Outcome::Segment(Segment::vowel("a")), 0.0)]);
        assert!(reg.add(&l, config("underlying", Action::Transform, zero)).is_err());
        assert!(reg.add(&l, config("underlying", Action::Promote, OutcomeSpec::default())).is_ok());
    }

    #[test]
    fn layer_index_resumes_after_a_rule() {
        let mut reg = Registry::new(2);
        let l = layers();
        for layer in ["underlying", "phonic", "underlying", "underlying"] {
            reg.add(&l, config(layer, Action::Transform, vec![Segment::vowel("a")].into())).unwrap();
        }
        assert_eq!(reg.layer_rules_from(0, 0), &[0, 2, 3]);
        assert_eq!(reg.layer_rules_from(0, 1), &[2, 3]);
        assert_eq!(reg.layer_rules_from(0, 4), &[] as &[RuleId]);
        assert_eq!(reg.layer_rules_from(1, 0), &[1]);
    }

    #[test]
    fn layers_reject_duplicates() {
        assert_eq!(Layers::new(["a", "a"]).unwrap_err(), Error::DuplicateLayer("a".to_string()));
        assert_eq!(Layers::new(Vec::<String>::new()).unwrap_err(), Error::NoLayers);
    }
}
