//! Tracker arena.
//!
//! A word is a `TrackerList`; every segment gets a `Tracker`. A tracker's
//! current choice at some layer can itself be a list (an expansion), so the
//! structure is a graph: lists hold trackers, trackers may hold lists. Both
//! live in flat vectors and refer to each other by index, which keeps
//! ownership acyclic.
//!
//! ```text
//! root list:   [t0] <-> [t1] <-> [t2]
//!                         │ layer 1: Choice::List(l1)
//!                         v
//! list l1:            [t3] <-> [t4]        parent = t1
//! ```
//!
//! Sibling links never cross a list boundary. Walking off the edge of a
//! nested list continues from the enclosing tracker (`Graph::step`), which is
//! how an expansion sees the neighbors of the segment it replaced.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use super::history::{Choice, TrackerChoices, TrackerHistory};
use super::resolve::{Link, RELATION_COUNT, Relations};
use crate::{Error, Metadata, Result, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackerId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub(crate) usize);

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Where to insert relative to an anchor tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

/// How a tracker looks at one layer.
#[derive(Debug)]
pub(crate) enum View<'a> {
    Leaf(&'a Segment),
    /// The tracker was expanded at or below this layer.
    List(ListId),
    /// The tracker has not reached this layer (yet).
    Pending,
}

#[derive(Debug)]
pub(crate) struct Tracker {
    pub list: ListId,
    pub prev: Option<TrackerId>,
    pub next: Option<TrackerId>,
    /// Layer at which this tracker entered the pipeline.
    pub min_layer: usize,
    pub history: Vec<TrackerHistory>,
    pub cache: Vec<[Option<Link>; RELATION_COUNT]>,
    /// Per layer, trackers to replay when this one changes, in registration order.
    pub dependents: Vec<Vec<(TrackerId, Relations)>>,
}

#[derive(Debug)]
pub(crate) struct TrackerList {
    head: Option<TrackerId>,
    tail: Option<TrackerId>,
    /// Tracker whose expansion produced this list; `None` for the word itself.
    pub parent: Option<TrackerId>,
    /// Layer the list's trackers entered at.
    pub layer: usize,
    pub meta: Rc<Metadata>,
}

#[derive(Debug)]
pub(crate) struct Graph {
    trackers: Vec<Tracker>,
    lists: Vec<TrackerList>,
    layers: usize,
    context: Rc<BTreeSet<String>>,
}

impl Graph {
    pub(crate) fn new(layers: usize, context: BTreeSet<String>) -> Self {
        Graph { trackers: Vec::new(), lists: Vec::new(), layers, context: Rc::new(context) }
    }

    pub(crate) fn layers(&self) -> usize {
        self.layers
    }

    pub(crate) fn context(&self) -> &BTreeSet<String> {
        &self.context
    }

    pub(crate) fn tracker(&self, id: TrackerId) -> &Tracker {
        &self.trackers[id.0]
    }

    pub(crate) fn tracker_mut(&mut self, id: TrackerId) -> &mut Tracker {
        &mut self.trackers[id.0]
    }

    pub(crate) fn list(&self, id: ListId) -> &TrackerList {
        &self.lists[id.0]
    }

    pub(crate) fn contains(&self, id: TrackerId) -> bool {
        id.0 < self.trackers.len()
    }

    /// Metadata of the word a tracker belongs to.
    pub(crate) fn meta(&self, id: TrackerId) -> &Metadata {
        &self.lists[self.tracker(id).list.0].meta
    }

    fn new_tracker(&mut self, list: ListId, layer: usize, segment: Segment, reason: &str) -> TrackerId {
        let id = TrackerId(self.trackers.len());
        let mut history = vec![TrackerHistory::default(); self.layers];
        history[layer].insert_one(TrackerChoices::seed(Choice::Segment(segment), reason));
        self.trackers.push(Tracker {
            list,
            prev: None,
            next: None,
            min_layer: layer,
            history,
            cache: vec![Default::default(); self.layers],
            dependents: vec![Vec::new(); self.layers],
        });
        id
    }

    /// Materialize `segments` as a fresh list entering the pipeline at `layer`.
    pub(crate) fn build_list(
        &mut self,
        segments: &[Segment],
        layer: usize,
        parent: Option<TrackerId>,
        meta: Rc<Metadata>,
        reason: &str,
    ) -> ListId {
        let list = ListId(self.lists.len());
        self.lists.push(TrackerList { head: None, tail: None, parent, layer, meta });

        let mut last: Option<TrackerId> = None;
        for segment in segments {
            let id = self.new_tracker(list, layer, segment.clone(), reason);
            if let Some(prev) = last {
                self.trackers[prev.0].next = Some(id);
                self.trackers[id.0].prev = Some(prev);
            } else {
                self.lists[list.0].head = Some(id);
            }
            last = Some(id);
        }
        self.lists[list.0].tail = last;
        list
    }

    /// Link a new tracker next to `anchor` inside the anchor's list. Returns
    /// the new tracker and the neighbor it was inserted against, if any.
    pub(crate) fn insert(&mut self, anchor: TrackerId, side: Side, segment: Segment) -> (TrackerId, Option<TrackerId>) {
        let list = self.tracker(anchor).list;
        let layer = self.lists[list.0].layer;
        let id = self.new_tracker(list, layer, segment, "Inserted.");
        let displaced = match side {
            Side::After => {
                let old = self.trackers[anchor.0].next;
                self.trackers[id.0].prev = Some(anchor);
                self.trackers[id.0].next = old;
                self.trackers[anchor.0].next = Some(id);
                if let Some(o) = old {
                    self.trackers[o.0].prev = Some(id);
                }
                old
            }
            Side::Before => {
                let old = self.trackers[anchor.0].prev;
                self.trackers[id.0].next = Some(anchor);
                self.trackers[id.0].prev = old;
                self.trackers[anchor.0].prev = Some(id);
                if let Some(o) = old {
                    self.trackers[o.0].next = Some(id);
                }
                old
            }
        };
        (id, displaced)
    }

    /// Effective first tracker of a list. The recorded head is only a
    /// starting point: trackers inserted in front of it are found by walking
    /// back along sibling links.
    pub(crate) fn head(&self, list: ListId) -> Result<Option<TrackerId>> {
        self.edge(list, Direction::Forward)
    }

    /// The end of `list` a walk in `dir` enters through.
    pub(crate) fn edge(&self, list: ListId, dir: Direction) -> Result<Option<TrackerId>> {
        let l = &self.lists[list.0];
        let start = match (l.head, l.tail) {
            (None, None) => return Ok(None),
            (Some(head), Some(_)) if dir == Direction::Forward => head,
            (Some(_), Some(tail)) => tail,
            _ => return Err(Error::InvariantViolation(format!("list {list} has only one open end"))),
        };
        let mut cur = start;
        while let Some(further) = self.sibling(cur, dir.reverse()) {
            cur = further;
        }
        Ok(Some(cur))
    }

    /// Trackers of a list in order.
    pub(crate) fn members(&self, list: ListId) -> Result<Vec<TrackerId>> {
        let mut out = Vec::new();
        let mut cur = self.head(list)?;
        while let Some(id) = cur {
            out.push(id);
            cur = self.trackers[id.0].next;
        }
        Ok(out)
    }

    fn sibling(&self, id: TrackerId, dir: Direction) -> Option<TrackerId> {
        let node = &self.trackers[id.0];
        match dir {
            Direction::Forward => node.next,
            Direction::Backward => node.prev,
        }
    }

    /// Next tracker in `dir`, leaving nested lists through their parent.
    pub(crate) fn step(&self, id: TrackerId, dir: Direction) -> Option<TrackerId> {
        let mut cur = id;
        loop {
            if let Some(sib) = self.sibling(cur, dir) {
                return Some(sib);
            }
            cur = self.lists[self.trackers[cur.0].list.0].parent?;
        }
    }

    pub(crate) fn view(&self, id: TrackerId, layer: usize) -> View<'_> {
        let node = &self.trackers[id.0];
        if layer < node.min_layer || layer >= self.layers {
            return View::Pending;
        }
        for k in (node.min_layer..=layer).rev() {
            match node.history[k].current_choice() {
                None => continue,
                Some(Choice::List(list)) => return View::List(*list),
                Some(Choice::Segment(s)) if k == layer => return View::Leaf(s),
                Some(Choice::Segment(_) | Choice::Sequence(_)) => return View::Pending,
            }
        }
        View::Pending
    }

    pub(crate) fn segment_at(&self, id: TrackerId, layer: usize) -> Option<&Segment> {
        match self.view(id, layer) {
            View::Leaf(s) => Some(s),
            _ => None,
        }
    }

    /// A tracker is live while every enclosing list is the current choice of
    /// its parent. Trackers of abandoned expansions are not.
    pub(crate) fn is_live(&self, id: TrackerId) -> bool {
        let mut list = self.trackers[id.0].list;
        loop {
            let l = &self.lists[list.0];
            let Some(parent) = l.parent else {
                return true;
            };
            match self.trackers[parent.0].history[l.layer].current_choice() {
                Some(Choice::List(current)) if *current == list => list = self.trackers[parent.0].list,
                _ => return false,
            }
        }
    }

    /// Record that `dependent` has to be replayed when `target` changes at
    /// `layer`. Repeated registrations merge their relation sets.
    pub(crate) fn add_dependent(&mut self, target: TrackerId, layer: usize, dependent: TrackerId, relations: Relations) {
        let deps = &mut self.trackers[target.0].dependents[layer];
        match deps.iter_mut().find(|(d, _)| *d == dependent) {
            Some((_, rels)) => *rels |= relations,
            None => deps.push((dependent, relations)),
        }
    }

    pub(crate) fn take_dependents(&mut self, target: TrackerId, layer: usize) -> Vec<(TrackerId, Relations)> {
        std::mem::take(&mut self.trackers[target.0].dependents[layer])
    }

    /// Drop cached links of `id` at `layer` for the given relations.
    pub(crate) fn forget(&mut self, id: TrackerId, layer: usize, relations: Relations) {
        let cache = &mut self.trackers[id.0].cache[layer];
        for rel in relations.iter_relations() {
            cache[rel.index()] = None;
        }
    }
}

impl Direction {
    pub(crate) fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(values: &[&str]) -> (Graph, ListId) {
        let mut g = Graph::new(2, BTreeSet::new());
        let segments: Vec<Segment> = values.iter().map(|v| Segment::consonant(*v)).collect();
        let root = g.build_list(&segments, 0, None, Rc::new(Metadata::new()), "Underlying.");
        (g, root)
    }

    #[test]
    fn builds_linked_list() {
        let (g, root) = word(&["k", "t", "b"]);
        let members = g.members(root).unwrap();
        assert_eq!(members, vec![TrackerId(0), TrackerId(1), TrackerId(2)]);
        assert_eq!(g.step(TrackerId(0), Direction::Backward), None);
        assert_eq!(g.step(TrackerId(1), Direction::Forward), Some(TrackerId(2)));
        assert_eq!(g.segment_at(TrackerId(1), 0).map(|s| s.value.as_str()), Some("t"));
        assert!(matches!(g.view(TrackerId(1), 1), View::Pending));
    }

    #[test]
    fn effective_ends_follow_edge_insertions() {
        let (mut g, root) = word(&["k", "t"]);
        let (front, displaced) = g.insert(TrackerId(0), Side::Before, Segment::vowel("a"));
        assert_eq!(displaced, None);
        let (back, _) = g.insert(TrackerId(1), Side::After, Segment::vowel("u"));
        assert_eq!(g.head(root).unwrap(), Some(front));
        assert_eq!(g.edge(root, Direction::Backward).unwrap(), Some(back));
        assert_eq!(g.members(root).unwrap().len(), 4);
    }

    #[test]
    fn nested_lists_fall_back_to_parent_neighbors() {
        let (mut g, _root) = word(&["k", "t", "b"]);
        let meta = Rc::clone(&g.list(ListId(0)).meta);
        let nested = g.build_list(&[Segment::vowel("a"), Segment::vowel("i")], 1, Some(TrackerId(1)), meta, "Expanded.");
        g.tracker_mut(TrackerId(1)).history[1].insert_one(TrackerChoices::seed(Choice::List(nested), "expand"));

        let inner = g.members(nested).unwrap();
        assert_eq!(g.step(inner[1], Direction::Forward), Some(TrackerId(2)));
        assert_eq!(g.step(inner[0], Direction::Backward), Some(TrackerId(0)));
        assert!(matches!(g.view(TrackerId(1), 1), View::List(l) if l == nested));
        assert!(g.is_live(inner[0]));

        g.tracker_mut(TrackerId(1)).history[1].clear();
        assert!(!g.is_live(inner[0]));
    }

    #[test]
    fn one_open_end_is_an_invariant_violation() {
        let (mut g, root) = word(&["k"]);
        g.lists[root.0].tail = None;
        assert!(matches!(g.head(root), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn dependents_merge_relations() {
        let (mut g, _) = word(&["k", "t"]);
        g.add_dependent(TrackerId(1), 0, TrackerId(0), Relations::NEXT);
        g.add_dependent(TrackerId(1), 0, TrackerId(0), Relations::NEXT_VOWEL);
        let deps = g.take_dependents(TrackerId(1), 0);
        assert_eq!(deps, vec![(TrackerId(0), Relations::NEXT | Relations::NEXT_VOWEL)]);
        assert!(g.take_dependents(TrackerId(1), 0).is_empty());
    }
}
