//! The environment a rule condition is evaluated in.

use std::collections::BTreeSet;

use super::graph::{Graph, TrackerId};
use super::resolve::{Lookup, Relation};
use crate::{Metadata, Result, Segment};

/// Read-only view of one tracker's surroundings at one layer.
///
/// Every relation read through an `Environment` is recorded as a dependency,
/// so a condition is re-evaluated whenever something it looked at changes.
/// Word metadata and context tags are frozen for the run and record nothing.
#[derive(Debug)]
pub struct Environment<'g> {
    graph: &'g mut Graph,
    owner: TrackerId,
    /// Tracker whose rule is being evaluated.
    observer: TrackerId,
    layer: usize,
}

impl<'g> Environment<'g> {
    pub(crate) fn new(graph: &'g mut Graph, owner: TrackerId, layer: usize) -> Self {
        Environment { graph, owner, observer: owner, layer }
    }

    /// The tracker this environment surrounds.
    pub fn tracker(&self) -> TrackerId {
        self.owner
    }

    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Value of the tracker itself at this layer.
    pub fn segment(&self) -> Option<&Segment> {
        self.graph.segment_at(self.owner, self.layer)
    }

    pub fn lookup(&mut self, relation: Relation) -> Result<Lookup> {
        self.graph.resolve(self.owner, self.layer, relation, self.observer)
    }

    /// The related segment, if it exists and already has a value here.
    pub fn neighbor(&mut self, relation: Relation) -> Result<Option<&Segment>> {
        match self.lookup(relation)? {
            Lookup::Found(id) => Ok(self.graph.segment_at(id, self.layer)),
            Lookup::Pending(_) | Lookup::Missing => Ok(None),
        }
    }

    /// Whether the related segment exists at all, resolved or not.
    pub fn exists(&mut self, relation: Relation) -> Result<bool> {
        Ok(!matches!(self.lookup(relation)?, Lookup::Missing))
    }

    /// The environment of the related segment, still reporting to the
    /// current observer.
    pub fn through(&mut self, relation: Relation) -> Result<Option<Environment<'_>>> {
        match self.lookup(relation)? {
            Lookup::Found(id) => Ok(Some(Environment {
                graph: &mut *self.graph,
                owner: id,
                observer: self.observer,
                layer: self.layer,
            })),
            Lookup::Pending(_) | Lookup::Missing => Ok(None),
        }
    }

    pub fn word(&self) -> &Metadata {
        self.graph.meta(self.owner)
    }

    pub fn context(&self) -> &BTreeSet<String> {
        self.graph.context()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::resolve::Relations;
    use crate::{Condition, Feature, Predicate};

    fn graph() -> Graph {
        let mut meta = Metadata::new();
        meta.insert("gender".to_string(), Feature::from("fem"));
        let mut g = Graph::new(1, ["pausal".to_string()].into_iter().collect());
        g.build_list(
            &[Segment::consonant("k"), Segment::vowel("a"), Segment::consonant("t")],
            0,
            None,
            Rc::new(meta),
            "Underlying.",
        );
        g
    }

    #[test]
    fn reads_neighbors_and_word_state() {
        let mut g = graph();
        let mut env = Environment::new(&mut g, TrackerId(1), 0);
        assert_eq!(env.segment().map(|s| s.value.as_str()), Some("a"));
        assert_eq!(env.neighbor(Relation::Prev).unwrap().map(|s| s.value.clone()), Some("k".to_string()));
        assert!(env.exists(Relation::NextConsonant).unwrap());
        assert!(!env.exists(Relation::NextVowel).unwrap());
        assert_eq!(env.word().get("gender"), Some(&Feature::from("fem")));
        assert!(env.context().contains("pausal"));
    }

    #[test]
    fn conditions_see_through_neighbors() {
        let mut g = graph();
        // "k" is followed by a vowel that is itself followed by "t"
        let cond = Condition::through(Relation::Next, Condition::before(Predicate::value("t")));
        assert!(cond.evaluate(&mut Environment::new(&mut g, TrackerId(0), 0)).unwrap());
        assert!(g.tracker(TrackerId(2)).dependents[0].contains(&(TrackerId(0), Relations::empty())));

        let cond = Condition::through(Relation::Prev, Condition::Always);
        assert!(!cond.evaluate(&mut Environment::new(&mut g, TrackerId(0), 0)).unwrap());
        assert!(Condition::word_initial().evaluate(&mut Environment::new(&mut g, TrackerId(0), 0)).unwrap());
        assert!(Condition::word("gender", "fem").evaluate(&mut Environment::new(&mut g, TrackerId(2), 0)).unwrap());
    }
}
