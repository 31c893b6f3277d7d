//! Neighbor resolution.
//!
//! A rule condition asks questions like "what is the next consonant". The
//! answer is computed on first use, memoized per (tracker, layer, relation)
//! and recorded as a dependency edge on every tracker the walk touched. When
//! any of those trackers changes, the edge fires: the cached link is dropped
//! and the asking tracker is queued for replay.
//!
//! ## Walk
//!
//! ```text
//! owner ─step→ c ──┬─ nothing            -> Missing
//!                  ├─ no value at layer  -> Pending(c)
//!                  ├─ nested list        -> continue at its head/tail
//!                  │                        (or past c when it is empty)
//!                  ├─ matches the filter -> Found(c)
//!                  └─ otherwise          -> c's own link for the relation
//! ```
//!
//! Reusing the neighbor's own link means a run of vowels between two
//! consonants is walked once, not once per vowel.

use std::fmt;
use std::str::FromStr;

use super::graph::{Direction, Graph, TrackerId, View};
use crate::{Error, Result, SegmentKind};

pub(crate) const RELATION_COUNT: usize = 6;

/// The six directional neighbor relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Next,
    Prev,
    NextConsonant,
    PrevConsonant,
    NextVowel,
    PrevVowel,
}

bitflags::bitflags! {
    /// Set of relations a dependent relies on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Relations: u8 {
        const NEXT           = 1 << 0;
        const PREV           = 1 << 1;
        const NEXT_CONSONANT = 1 << 2;
        const PREV_CONSONANT = 1 << 3;
        const NEXT_VOWEL     = 1 << 4;
        const PREV_VOWEL     = 1 << 5;
    }
}

impl Relation {
    pub const ALL: [Relation; RELATION_COUNT] = [
        Relation::Next,
        Relation::Prev,
        Relation::NextConsonant,
        Relation::PrevConsonant,
        Relation::NextVowel,
        Relation::PrevVowel,
    ];

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Relation::Next => "next",
            Relation::Prev => "prev",
            Relation::NextConsonant => "nextConsonant",
            Relation::PrevConsonant => "prevConsonant",
            Relation::NextVowel => "nextVowel",
            Relation::PrevVowel => "prevVowel",
        }
    }

    pub(crate) fn direction(self) -> Direction {
        match self {
            Relation::Next | Relation::NextConsonant | Relation::NextVowel => Direction::Forward,
            Relation::Prev | Relation::PrevConsonant | Relation::PrevVowel => Direction::Backward,
        }
    }

    /// Whether a segment of `kind` stops the walk.
    pub fn accepts(self, kind: &SegmentKind) -> bool {
        match self {
            Relation::Next | Relation::Prev => true,
            Relation::NextConsonant | Relation::PrevConsonant => *kind == SegmentKind::Consonant,
            Relation::NextVowel | Relation::PrevVowel => *kind == SegmentKind::Vowel,
        }
    }

    pub fn flag(self) -> Relations {
        match self {
            Relation::Next => Relations::NEXT,
            Relation::Prev => Relations::PREV,
            Relation::NextConsonant => Relations::NEXT_CONSONANT,
            Relation::PrevConsonant => Relations::PREV_CONSONANT,
            Relation::NextVowel => Relations::NEXT_VOWEL,
            Relation::PrevVowel => Relations::PREV_VOWEL,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Relation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "next" => Relation::Next,
            "prev" => Relation::Prev,
            "nextConsonant" | "next_consonant" => Relation::NextConsonant,
            "prevConsonant" | "prev_consonant" => Relation::PrevConsonant,
            "nextVowel" | "next_vowel" => Relation::NextVowel,
            "prevVowel" | "prev_vowel" => Relation::PrevVowel,
            other => return Err(Error::UnknownDependencyKind(other.to_string())),
        })
    }
}

impl From<Relation> for Relations {
    fn from(r: Relation) -> Self {
        r.flag()
    }
}

impl Relations {
    pub(crate) fn iter_relations(self) -> impl Iterator<Item = Relation> {
        Relation::ALL.into_iter().filter(move |r| self.contains(r.flag()))
    }
}

/// Result of resolving a relation. `Missing` is the explicit "does not
/// exist" marker for walks that ran off the word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(TrackerId),
    /// The neighbor exists but has no value at this layer yet.
    Pending(TrackerId),
    Missing,
}

/// A memoized lookup plus every tracker the walk went through.
#[derive(Debug, Clone)]
pub(crate) struct Link {
    pub lookup: Lookup,
    pub path: Vec<TrackerId>,
}

enum Probe {
    Pending,
    Descend(super::graph::ListId),
    Found,
    Skip,
}

impl Graph {
    /// Resolve `relation` for `owner` at `layer`.
    ///
    /// `observer` is the tracker whose rule is being evaluated. It differs
    /// from `owner` when a condition looks through a neighbor's environment;
    /// the observer is then registered along the path as well, so it gets
    /// replayed when anything the nested lookup saw changes.
    pub(crate) fn resolve(
        &mut self,
        owner: TrackerId,
        layer: usize,
        relation: Relation,
        observer: TrackerId,
    ) -> Result<Lookup> {
        let lookup = self.ensure_link(owner, layer, relation)?;
        if observer != owner {
            for c in self.cached_path(owner, layer, relation) {
                self.add_dependent(c, layer, observer, Relations::empty());
            }
        }
        Ok(lookup)
    }

    fn cached_path(&self, owner: TrackerId, layer: usize, relation: Relation) -> Vec<TrackerId> {
        self.tracker(owner).cache[layer][relation.index()].as_ref().map(|l| l.path.clone()).unwrap_or_default()
    }

    fn ensure_link(&mut self, owner: TrackerId, layer: usize, relation: Relation) -> Result<Lookup> {
        if let Some(link) = &self.tracker(owner).cache[layer][relation.index()] {
            return Ok(link.lookup);
        }
        let link = self.walk(owner, layer, relation)?;
        for &c in &link.path {
            self.add_dependent(c, layer, owner, relation.flag());
        }
        tracing::trace!(
            tracker = %owner,
            layer,
            relation = relation.name(),
            lookup = ?link.lookup,
            path = link.path.len(),
            "resolved relation"
        );
        let lookup = link.lookup;
        self.tracker_mut(owner).cache[layer][relation.index()] = Some(link);
        Ok(lookup)
    }

    fn walk(&mut self, owner: TrackerId, layer: usize, relation: Relation) -> Result<Link> {
        let dir = relation.direction();
        let mut path = Vec::new();
        let mut candidate = self.step(owner, dir);

        while let Some(c) = candidate {
            path.push(c);
            let probe = match self.view(c, layer) {
                View::Pending => Probe::Pending,
                View::List(list) => Probe::Descend(list),
                View::Leaf(s) if relation.accepts(&s.kind) => Probe::Found,
                View::Leaf(_) => Probe::Skip,
            };
            match probe {
                Probe::Pending => return Ok(Link { lookup: Lookup::Pending(c), path }),
                Probe::Found => return Ok(Link { lookup: Lookup::Found(c), path }),
                Probe::Descend(list) => {
                    candidate = match self.edge(list, dir)? {
                        Some(inner) => Some(inner),
                        None => self.step(c, dir),
                    };
                }
                Probe::Skip => {
                    let lookup = self.ensure_link(c, layer, relation)?;
                    path.extend(self.cached_path(c, layer, relation));
                    return Ok(Link { lookup, path });
                }
            }
        }
        Ok(Link { lookup: Lookup::Missing, path })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::rc::Rc;

    use super::*;
    use crate::engine::history::{Choice, TrackerChoices};
    use crate::{Metadata, Segment};

    fn graph(segments: &[Segment]) -> Graph {
        let mut g = Graph::new(2, BTreeSet::new());
        g.build_list(segments, 0, None, Rc::new(Metadata::new()), "Underlying.");
        g
    }

    #[test]
    fn parses_relation_names() {
        assert_eq!("nextConsonant".parse::<Relation>(), Ok(Relation::NextConsonant));
        assert_eq!("prev_vowel".parse::<Relation>(), Ok(Relation::PrevVowel));
        assert_eq!("word".parse::<Relation>(), Err(Error::UnknownDependencyKind("word".to_string())));
    }

    #[test]
    fn adjacency_and_edges() {
        let mut g = graph(&[Segment::consonant("k"), Segment::vowel("a")]);
        let (k, a) = (TrackerId(0), TrackerId(1));
        assert_eq!(g.resolve(a, 0, Relation::Prev, a), Ok(Lookup::Found(k)));
        assert_eq!(g.resolve(k, 0, Relation::Prev, k), Ok(Lookup::Missing));
        assert_eq!(g.tracker(k).dependents[0], vec![(a, Relations::PREV)]);
    }

    #[test]
    fn filtered_relations_skip_and_register_on_the_path() {
        let mut g = graph(&[Segment::vowel("a"), Segment::vowel("i"), Segment::consonant("t"), Segment::vowel("u")]);
        let (a, i, t) = (TrackerId(0), TrackerId(1), TrackerId(2));
        assert_eq!(g.resolve(a, 0, Relation::NextConsonant, a), Ok(Lookup::Found(t)));
        // the skipped vowel memoized its own link
        assert!(g.tracker(i).cache[0][Relation::NextConsonant.index()].is_some());
        assert!(g.tracker(i).dependents[0].iter().any(|(d, r)| *d == a && r.contains(Relations::NEXT_CONSONANT)));
        assert!(g.tracker(t).dependents[0].iter().any(|(d, _)| *d == a));
        assert_eq!(g.resolve(t, 0, Relation::NextConsonant, t), Ok(Lookup::Missing));
        assert_eq!(g.resolve(t, 0, Relation::PrevVowel, t), Ok(Lookup::Found(i)));
    }

    #[test]
    fn unreached_layers_are_pending() {
        let mut g = graph(&[Segment::consonant("k"), Segment::vowel("a")]);
        assert_eq!(g.resolve(TrackerId(0), 1, Relation::Next, TrackerId(0)), Ok(Lookup::Pending(TrackerId(1))));
    }

    #[test]
    fn descends_into_expansions() {
        let mut g = graph(&[Segment::consonant("k"), Segment::vowel("a"), Segment::consonant("t")]);
        let (k, a, t) = (TrackerId(0), TrackerId(1), TrackerId(2));
        for id in [k, t] {
            let seg = g.segment_at(id, 0).cloned().unwrap();
            g.tracker_mut(id).history[1].insert_one(TrackerChoices::seed(Choice::Segment(seg), "promote"));
        }
        let meta = Rc::clone(&g.list(g.tracker(a).list).meta);
        let nested = g.build_list(&[Segment::consonant("y"), Segment::vowel("a")], 1, Some(a), meta, "Expanded.");
        g.tracker_mut(a).history[1].insert_one(TrackerChoices::seed(Choice::List(nested), "expand"));
        let inner = g.members(nested).unwrap();

        assert_eq!(g.resolve(k, 1, Relation::Next, k), Ok(Lookup::Found(inner[0])));
        assert_eq!(g.resolve(k, 1, Relation::NextVowel, k), Ok(Lookup::Found(inner[1])));
        assert_eq!(g.resolve(t, 1, Relation::PrevConsonant, t), Ok(Lookup::Found(inner[0])));
        assert_eq!(g.resolve(inner[1], 1, Relation::Next, inner[1]), Ok(Lookup::Found(t)));
        assert_eq!(g.resolve(inner[0], 1, Relation::Prev, inner[0]), Ok(Lookup::Found(k)));
    }

    #[test]
    fn empty_expansions_are_stepped_over() {
        let mut g = graph(&[Segment::consonant("k"), Segment::vowel("a"), Segment::consonant("t")]);
        let (k, a, t) = (TrackerId(0), TrackerId(1), TrackerId(2));
        for id in [k, t] {
            let seg = g.segment_at(id, 0).cloned().unwrap();
            g.tracker_mut(id).history[1].insert_one(TrackerChoices::seed(Choice::Segment(seg), "promote"));
        }
        let meta = Rc::clone(&g.list(g.tracker(a).list).meta);
        let nested = g.build_list(&[], 1, Some(a), meta, "Expanded.");
        g.tracker_mut(a).history[1].insert_one(TrackerChoices::seed(Choice::List(nested), "delete"));
        assert_eq!(g.resolve(k, 1, Relation::Next, k), Ok(Lookup::Found(t)));
        assert!(g.tracker(a).dependents[1].iter().any(|(d, _)| *d == k));
    }

    #[test]
    fn nested_observers_are_registered() {
        let mut g = graph(&[Segment::consonant("k"), Segment::vowel("a"), Segment::consonant("t")]);
        let (k, a, t) = (TrackerId(0), TrackerId(1), TrackerId(2));
        assert_eq!(g.resolve(a, 0, Relation::Next, k), Ok(Lookup::Found(t)));
        assert!(g.tracker(t).dependents[0].contains(&(k, Relations::empty())));
        assert!(g.tracker(t).dependents[0].contains(&(a, Relations::NEXT)));
    }
}
