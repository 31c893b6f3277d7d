//! Rule application, invalidation and replay.
//!
//! This module is the operational core of the engine. It owns the tracker
//! graph and drives it to a fixpoint:
//!
//! ```text
//! queue ── pop (T, L) ──> replay
//!                          - rewind to the last entry whose recorded
//!                            environment still holds
//!                          - scan rules from there
//!                               │
//!                               v
//!                   fire transform / promote / expand
//!                          - reproduces the recorded next entry? confirm
//!                          - otherwise record, truncate, `changed`
//!                               │
//!                               v
//!                   changed(T, K): drop dependents' cached links,
//!                   queue their replay  ──> back to the queue
//! ```
//!
//! ## Invariants
//!
//! - A scan considers each rule at most once and only moves up in layer, so
//!   one scan terminates. The cascade as a whole is bounded by
//!   `Options::step_limit`.
//! - Confirming a recorded decision never draws from the choice source and
//!   never invalidates anything. Replays of an unchanged neighborhood are
//!   therefore free of side effects.
//! - A layer left behind by a scan has no recorded future: leftovers are
//!   truncated and reported as a change.
//! - Trackers of an abandoned expansion are never scanned again.

use std::rc::Rc;
use std::time::Instant;

use super::choice::ChoiceSource;
use super::environment::Environment;
use super::graph::{Graph, ListId, Side, TrackerId, View};
use super::history::{Choice, TrackerChoices, TrackerHistory};
use super::metrics::RunMetrics;
use super::queue::WorkQueue;
use super::registry::{Action, Candidates, Registry, Rule, RuleId};
use super::resolve::Relations;
use crate::{Error, Result, Segment};

#[derive(Debug)]
pub(crate) struct Rewriter {
    graph: Graph,
    registry: Rc<Registry>,
    root: ListId,
    queue: WorkQueue,
    chooser: Box<dyn ChoiceSource>,
    step_limit: usize,
    steps: usize,
    metrics: RunMetrics,
}

impl Rewriter {
    pub(crate) fn new(
        graph: Graph,
        registry: Rc<Registry>,
        root: ListId,
        chooser: Box<dyn ChoiceSource>,
        step_limit: usize,
    ) -> Self {
        Rewriter {
            graph,
            registry,
            root,
            queue: WorkQueue::default(),
            chooser,
            step_limit,
            steps: 0,
            metrics: RunMetrics::default(),
        }
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn root(&self) -> ListId {
        self.root
    }

    // --- Entry points -------------------------------------------------------

    /// Apply rules to every top-level tracker from layer 0, left to right.
    pub(crate) fn init(&mut self) -> Result<RunMetrics> {
        let start = self.begin();
        for id in self.graph.members(self.root)? {
            self.queue.push(id, 0);
        }
        self.drain()?;
        Ok(self.finish(start))
    }

    /// Re-select option `option` of history entry `entry` and re-derive
    /// everything downstream. Returns whether anything changed.
    pub(crate) fn choose(&mut self, t: TrackerId, layer: usize, entry: usize, option: usize) -> Result<bool> {
        if self.graph.contains(t) && !self.graph.is_live(t) {
            return Err(Error::InvalidEdit(format!("{t} belongs to an abandoned expansion")));
        }
        let start = self.begin();
        let history = self.history_mut(t, layer)?;
        if entry >= history.len() {
            return Err(Error::InvalidEdit(format!("{t} has no entry {entry} at layer {layer}")));
        }
        let cursor = history.cursor();
        history.revert(entry);
        let changed = match history.choose(option) {
            Ok(changed) => changed,
            Err(e) => {
                if let Some(c) = cursor {
                    history.revert(c);
                }
                return Err(e);
            }
        };
        if !changed {
            if let Some(c) = cursor {
                history.revert(c);
            }
            self.finish(start);
            return Ok(false);
        }

        let resume = history.entries()[entry].resume_from();
        let reason = history.entries()[entry].reason().to_string();
        let selected = history.current_choice().cloned();
        tracing::debug!(tracker = %t, layer, entry, option, "selection changed");

        let list = match selected {
            Some(Choice::List(list)) => Some(list),
            Some(Choice::Sequence(segments)) => {
                let meta = Rc::clone(&self.graph.list(self.graph.tracker(t).list).meta);
                let list = self.graph.build_list(&segments, layer, Some(t), meta, &reason);
                self.graph.tracker_mut(t).history[layer].materialize(Choice::List(list));
                Some(list)
            }
            Some(Choice::Segment(_)) | None => None,
        };
        if let Some(list) = list {
            for child in self.graph.members(list)? {
                self.queue.push(child, layer);
            }
        }
        self.changed(t, layer)?;
        self.scan(t, layer, resume)?;
        self.drain()?;
        self.finish(start);
        Ok(true)
    }

    /// Link `segment` next to `anchor` and fold it into the derivation.
    pub(crate) fn insert(&mut self, anchor: TrackerId, side: Side, segment: Segment) -> Result<TrackerId> {
        if !self.graph.contains(anchor) {
            return Err(Error::InvalidEdit(format!("no tracker {anchor}")));
        }
        if !self.graph.is_live(anchor) {
            return Err(Error::InvalidEdit(format!("{anchor} belongs to an abandoned expansion")));
        }
        let start = self.begin();
        let (id, displaced) = self.graph.insert(anchor, side, segment);
        tracing::debug!(tracker = %id, anchor = %anchor, ?side, "inserted");

        for neighbor in [Some(anchor), displaced].into_iter().flatten() {
            self.invalidate(neighbor)?;
        }
        let layer = self.graph.tracker(id).min_layer;
        self.queue.push(id, layer);
        self.drain()?;
        self.finish(start);
        Ok(id)
    }

    /// Flatten the current structure at `layer` into its segment sequence.
    pub(crate) fn collect(&self, layer: usize) -> Result<Vec<Segment>> {
        let mut out = Vec::new();
        self.collect_list(self.root, layer, &mut out)?;
        Ok(out)
    }

    fn collect_list(&self, list: ListId, layer: usize, out: &mut Vec<Segment>) -> Result<()> {
        for id in self.graph.members(list)? {
            match self.graph.view(id, layer) {
                View::Leaf(segment) => out.push(segment.clone()),
                View::List(nested) => self.collect_list(nested, layer, out)?,
                View::Pending => tracing::warn!(tracker = %id, layer, "segment never reached the layer, omitted"),
            }
        }
        Ok(())
    }

    pub(crate) fn history(&self, t: TrackerId, layer: usize) -> Result<&TrackerHistory> {
        if !self.graph.contains(t) {
            return Err(Error::InvalidEdit(format!("no tracker {t}")));
        }
        self.graph.tracker(t).history.get(layer).ok_or_else(|| Error::UnknownLayer(layer.to_string()))
    }

    fn history_mut(&mut self, t: TrackerId, layer: usize) -> Result<&mut TrackerHistory> {
        if !self.graph.contains(t) {
            return Err(Error::InvalidEdit(format!("no tracker {t}")));
        }
        self.graph.tracker_mut(t).history.get_mut(layer).ok_or_else(|| Error::UnknownLayer(layer.to_string()))
    }

    // --- Run bookkeeping ----------------------------------------------------

    fn begin(&mut self) -> Instant {
        self.steps = 0;
        self.metrics = RunMetrics::default();
        Instant::now()
    }

    fn finish(&mut self, start: Instant) -> RunMetrics {
        self.metrics.total = start.elapsed();
        std::mem::take(&mut self.metrics)
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            self.queue.clear();
            return Err(Error::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(task) = self.queue.pop() {
            self.metrics.passes += 1;
            tracing::trace!(tracker = %task.tracker, layer = task.layer, waiting = self.queue.len(), "task");
            self.replay(task.tracker, task.layer)?;
        }
        Ok(())
    }

    // --- Scanning -----------------------------------------------------------

    fn replay(&mut self, t: TrackerId, layer: usize) -> Result<()> {
        if !self.graph.is_live(t) || self.graph.tracker(t).history[layer].is_empty() {
            return Ok(());
        }
        let keep = self.valid_prefix(t, layer)?;
        let history = &mut self.graph.tracker_mut(t).history[layer];
        if history.len() > 1 {
            self.metrics.replays += 1;
            tracing::debug!(tracker = %t, layer, keep, recorded = history.len(), "replay");
        }
        history.revert(keep);
        let from = history.entries()[keep].resume_from();
        self.scan(t, layer, from)
    }

    /// Index of the last entry whose recorded environment, and that of every
    /// entry before it, still holds. The seed always stands.
    fn valid_prefix(&mut self, t: TrackerId, layer: usize) -> Result<usize> {
        let conditions: Vec<_> =
            self.graph.tracker(t).history[layer].entries().iter().skip(1).map(|e| e.environment().cloned()).collect();
        let mut keep = 0;
        for condition in conditions {
            if let Some(condition) = condition {
                if !condition.evaluate(&mut Environment::new(&mut self.graph, t, layer))? {
                    break;
                }
            }
            keep += 1;
        }
        Ok(keep)
    }

    /// Consider the rules of `layer` with an id of at least `from`, following
    /// promotions up the pipeline.
    fn scan(&mut self, t: TrackerId, mut layer: usize, mut from: RuleId) -> Result<()> {
        let registry = Rc::clone(&self.registry);
        'layers: loop {
            for &id in registry.layer_rules_from(layer, from) {
                self.tick()?;
                let rule = registry.get(id);
                let Some(segment) = self.graph.segment_at(t, layer) else {
                    break;
                };
                if !rule.trigger.matches(segment) {
                    continue;
                }
                let current = segment.clone();
                if !rule.condition.evaluate(&mut Environment::new(&mut self.graph, t, layer))? {
                    continue;
                }
                self.metrics.fired += 1;
                match rule.action {
                    Action::Transform => self.transform(t, layer, id, rule)?,
                    Action::Promote => {
                        self.promote(t, layer, id, rule, current)?;
                        self.settle(t, layer)?;
                        layer += 1;
                        from = id + 1;
                        continue 'layers;
                    }
                    Action::Expand => {
                        self.expand(t, layer, id, rule)?;
                        return self.settle(t, layer);
                    }
                }
            }
            self.settle(t, layer)?;
            return self.clear_above(t, layer);
        }
    }

    fn transform(&mut self, t: TrackerId, layer: usize, id: RuleId, rule: &Rule) -> Result<()> {
        let choices = segment_choices(rule, None)?;
        let history = &mut self.graph.tracker_mut(t).history[layer];
        if reproduces(history.peek_next(), id, &choices) {
            history.advance();
            self.metrics.confirmed += 1;
            return Ok(());
        }
        let current = select(self.chooser.as_mut(), &rule.weights);
        tracing::debug!(tracker = %t, layer, rule = id, reason = %rule.reason, into = %choice_label(&choices[current]), "transform");
        history.insert_one(TrackerChoices::new(
            choices,
            current,
            Some(id),
            rule.reason.clone(),
            Some(Rc::clone(&rule.condition)),
        ));
        self.changed(t, layer)
    }

    fn promote(&mut self, t: TrackerId, layer: usize, id: RuleId, rule: &Rule, current: Segment) -> Result<()> {
        let choices = segment_choices(rule, Some(current))?;
        let up = layer + 1;
        if reproduces(self.graph.tracker(t).history[up].entries().first(), id, &choices) {
            self.graph.tracker_mut(t).history[up].revert(0);
            self.metrics.confirmed += 1;
            return Ok(());
        }
        let selected = select(self.chooser.as_mut(), &rule.weights);
        tracing::debug!(tracker = %t, layer, rule = id, reason = %rule.reason, into = %choice_label(&choices[selected]), "promote");
        self.reset_above(t, layer);
        self.graph.tracker_mut(t).history[up].insert_one(TrackerChoices::new(
            choices,
            selected,
            Some(id),
            rule.reason.clone(),
            Some(Rc::clone(&rule.condition)),
        ));
        self.changed(t, up)
    }

    fn expand(&mut self, t: TrackerId, layer: usize, id: RuleId, rule: &Rule) -> Result<()> {
        let Candidates::Sequences(sequences) = &rule.candidates else {
            return Err(Error::InvariantViolation(format!("expand rule {id} without sequences")));
        };
        let up = layer + 1;
        let recorded = self.graph.tracker(t).history[up].entries().first().and_then(TrackerChoices::rule);
        if recorded == Some(id) {
            self.graph.tracker_mut(t).history[up].revert(0);
            self.metrics.confirmed += 1;
            return Ok(());
        }

        let selected = select(self.chooser.as_mut(), &rule.weights).min(sequences.len().saturating_sub(1));
        let Some(chosen) = sequences.get(selected) else {
            return Err(Error::InvariantViolation(format!("expand rule {id} without candidates")));
        };
        // only the selected candidate gets a list; `choose` builds the others
        let meta = Rc::clone(&self.graph.list(self.graph.tracker(t).list).meta);
        let list = self.graph.build_list(chosen, up, Some(t), meta, &rule.reason);
        tracing::debug!(tracker = %t, layer, rule = id, reason = %rule.reason, list = %list, len = chosen.len(), "expand");

        let choices = sequences
            .iter()
            .enumerate()
            .map(|(i, seq)| if i == selected { Choice::List(list) } else { Choice::Sequence(seq.clone()) })
            .collect();
        self.reset_above(t, layer);
        self.graph.tracker_mut(t).history[up].insert_one(TrackerChoices::new(
            choices,
            selected,
            Some(id),
            rule.reason.clone(),
            Some(Rc::clone(&rule.condition)),
        ));
        for child in self.graph.members(list)? {
            self.queue.push(child, up);
        }
        self.changed(t, up)
    }

    // --- Invalidation -------------------------------------------------------

    /// Leaving `layer`: whatever was recorded past the cursor is stale.
    fn settle(&mut self, t: TrackerId, layer: usize) -> Result<()> {
        if self.graph.tracker_mut(t).history[layer].truncate_future() {
            self.changed(t, layer)?;
        }
        Ok(())
    }

    /// The scan ended at `layer`; nothing above it is derived any more.
    fn clear_above(&mut self, t: TrackerId, layer: usize) -> Result<()> {
        if self.reset_above(t, layer) {
            tracing::debug!(tracker = %t, layer, "dropped higher layers");
            self.changed(t, layer + 1)?;
        }
        Ok(())
    }

    fn reset_above(&mut self, t: TrackerId, layer: usize) -> bool {
        let mut dropped = false;
        for history in self.graph.tracker_mut(t).history.iter_mut().skip(layer + 1) {
            dropped |= history.clear();
        }
        dropped
    }

    /// `t` changed at `from` (and so at every layer above): drop the cached
    /// links of its dependents and queue them.
    fn changed(&mut self, t: TrackerId, from: usize) -> Result<()> {
        for layer in from..self.graph.layers() {
            for (dependent, relations) in self.graph.take_dependents(t, layer) {
                self.graph.forget(dependent, layer, relations);
                if self.graph.is_live(dependent) && self.queue.push(dependent, layer) {
                    tracing::trace!(tracker = %dependent, layer, cause = %t, "queued dependent");
                }
            }
        }
        Ok(())
    }

    /// `t`'s sibling links changed: everything it resolved, and everything
    /// resolved through it, is stale.
    fn invalidate(&mut self, t: TrackerId) -> Result<()> {
        let min = self.graph.tracker(t).min_layer;
        for layer in min..self.graph.layers() {
            self.graph.forget(t, layer, Relations::all());
            if !self.graph.tracker(t).history[layer].is_empty() {
                self.queue.push(t, layer);
            }
        }
        self.changed(t, min)
    }
}

/// Segment candidates of a transform or promote. An empty promote carries
/// `carry` forward.
fn segment_choices(rule: &Rule, carry: Option<Segment>) -> Result<Vec<Choice>> {
    match (&rule.candidates, carry) {
        (Candidates::Segments(v), Some(current)) if v.is_empty() => Ok(vec![Choice::Segment(current)]),
        (Candidates::Segments(v), _) => Ok(v.iter().cloned().map(Choice::Segment).collect()),
        (Candidates::Sequences(_), _) => {
            Err(Error::InvariantViolation(format!("`{}` produces sequences outside an expansion", rule.reason)))
        }
    }
}

fn reproduces(recorded: Option<&TrackerChoices>, id: RuleId, choices: &[Choice]) -> bool {
    recorded.is_some_and(|e| e.rule() == Some(id) && e.choices() == choices)
}

fn select(chooser: &mut dyn ChoiceSource, weights: &[f64]) -> usize {
    if weights.len() <= 1 {
        return 0;
    }
    chooser.pick(weights).min(weights.len() - 1)
}

fn choice_label(choice: &Choice) -> String {
    match choice {
        Choice::Segment(s) => s.to_string(),
        Choice::List(l) => l.to_string(),
        Choice::Sequence(seq) => format!("{} unbuilt", seq.len()),
    }
}
