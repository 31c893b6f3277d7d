//! Rewrite history of one tracker at one layer.
//!
//! A `TrackerHistory` is an append-only timeline of `TrackerChoices` with a
//! cursor. Moving the cursor back (`revert`) does not forget anything; only
//! inserting or changing a selection truncates the recorded future, the same
//! way an editor drops its redo stack after a new edit.
//!
//! ```text
//! entries:  [seed] [t1] [t2] [t3]
//!                   ^ cursor after revert(1)
//! insert(x) -> [seed] [t1] [x]          cursor on x
//! choose(i) -> [seed] [t1*]             selection of t1 changed, caller re-derives
//! ```

use std::rc::Rc;

use super::graph::ListId;
use super::registry::RuleId;
use crate::{Condition, Error, Result, Segment};

/// What a history entry resolves to: a segment, or a nested list of trackers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Segment(Segment),
    List(ListId),
    /// Expansion candidate that was never selected, so no list exists yet.
    Sequence(Vec<Segment>),
}

impl Choice {
    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Choice::Segment(s) => Some(s),
            Choice::List(_) | Choice::Sequence(_) => None,
        }
    }
}

/// One rewrite decision: the candidates a rule offered and which one is
/// selected, with the rule's provenance.
#[derive(Debug, Clone)]
pub struct TrackerChoices {
    choices: Vec<Choice>,
    current: usize,
    rule: Option<RuleId>,
    reason: String,
    /// Precondition that held when the decision was taken; `None` for seeds.
    environment: Option<Rc<Condition>>,
}

impl TrackerChoices {
    pub(crate) fn new(
        choices: Vec<Choice>,
        current: usize,
        rule: Option<RuleId>,
        reason: impl Into<String>,
        environment: Option<Rc<Condition>>,
    ) -> Self {
        TrackerChoices { choices, current, rule, reason: reason.into(), environment }
    }

    /// A single unconditional choice, used to seed a layer.
    pub(crate) fn seed(choice: Choice, reason: impl Into<String>) -> Self {
        Self::new(vec![choice], 0, None, reason, None)
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_choice(&self) -> &Choice {
        &self.choices[self.current]
    }

    /// Index of the rule that produced this entry, if any.
    pub fn rule(&self) -> Option<RuleId> {
        self.rule
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub(crate) fn environment(&self) -> Option<&Rc<Condition>> {
        self.environment.as_ref()
    }

    /// First rule a scan resuming after this entry may consider.
    pub(crate) fn resume_from(&self) -> RuleId {
        self.rule.map_or(0, |r| r + 1)
    }

    fn choose(&mut self, idx: usize) {
        self.current = idx;
    }
}

/// Cursor-addressed timeline of decisions for one (tracker, layer).
#[derive(Debug, Clone, Default)]
pub struct TrackerHistory {
    entries: Vec<TrackerChoices>,
    /// Number of entries up to and including the current one.
    pos: usize,
}

impl TrackerHistory {
    pub fn entries(&self) -> &[TrackerChoices] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the current entry.
    pub fn cursor(&self) -> Option<usize> {
        self.pos.checked_sub(1)
    }

    pub fn current(&self) -> Option<&TrackerChoices> {
        self.cursor().map(|i| &self.entries[i])
    }

    pub fn current_choice(&self) -> Option<&Choice> {
        self.current().map(TrackerChoices::current_choice)
    }

    /// The recorded entry right after the cursor, if the cursor was reverted.
    pub(crate) fn peek_next(&self) -> Option<&TrackerChoices> {
        self.entries.get(self.pos)
    }

    /// Move the cursor onto entry `idx` without forgetting what follows.
    pub(crate) fn revert(&mut self, idx: usize) {
        self.pos = (idx + 1).min(self.entries.len());
    }

    /// Replace the selected option of the current entry, keeping its index.
    pub(crate) fn materialize(&mut self, choice: Choice) {
        if let Some(i) = self.cursor() {
            let entry = &mut self.entries[i];
            entry.choices[entry.current] = choice;
        }
    }

    /// Step onto the recorded next entry.
    pub(crate) fn advance(&mut self) {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
    }

    /// Drop everything after the cursor, then append `new` and move the
    /// cursor to the end.
    pub(crate) fn insert(&mut self, new: impl IntoIterator<Item = TrackerChoices>) {
        self.entries.truncate(self.pos);
        self.entries.extend(new);
        self.pos = self.entries.len();
    }

    pub(crate) fn insert_one(&mut self, entry: TrackerChoices) {
        self.insert(std::iter::once(entry));
    }

    /// Forget the recorded future. Returns true when something was dropped.
    pub(crate) fn truncate_future(&mut self) -> bool {
        let dropped = self.entries.len() > self.pos;
        self.entries.truncate(self.pos);
        dropped
    }

    /// Forget everything. Returns true when the history was not empty.
    pub(crate) fn clear(&mut self) -> bool {
        let dropped = !self.entries.is_empty();
        self.entries.clear();
        self.pos = 0;
        dropped
    }

    /// Select option `idx` of the current entry.
    ///
    /// Choosing the option that is already selected confirms it: the cursor
    /// moves past the entry and `false` is returned, nothing needs to be
    /// recomputed. Any other option mutates the entry, truncates the recorded
    /// future and returns `true`; the caller then has to insert whatever
    /// follows from the new selection.
    pub fn choose(&mut self, idx: usize) -> Result<bool> {
        let Some(cursor) = self.cursor() else {
            return Err(Error::InvalidEdit("cannot choose in an empty history".to_string()));
        };
        let entry = &mut self.entries[cursor];
        if idx >= entry.choices.len() {
            return Err(Error::InvalidEdit(format!("option {idx} out of {} choices", entry.choices.len())));
        }
        if idx == entry.current {
            self.advance();
            return Ok(false);
        }
        entry.choose(idx);
        self.insert(std::iter::empty());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(values: &[&str], rule: RuleId) -> TrackerChoices {
        TrackerChoices::new(
            values.iter().map(|v| Choice::Segment(Segment::vowel(*v))).collect(),
            0,
            Some(rule),
            "test",
            Some(Rc::new(Condition::Always)),
        )
    }

    fn value(h: &TrackerHistory) -> &str {
        &h.current_choice().and_then(Choice::segment).unwrap().value
    }

    #[test]
    fn insert_discards_the_redo_tail() {
        let mut h = TrackerHistory::default();
        h.insert_one(TrackerChoices::seed(Choice::Segment(Segment::vowel("a")), "Underlying."));
        h.insert([entry(&["b"], 0), entry(&["c"], 1)]);
        assert_eq!(h.len(), 3);
        assert_eq!(value(&h), "c");

        h.revert(1);
        assert_eq!(value(&h), "b");
        assert_eq!(h.len(), 3);
        assert_eq!(h.peek_next().and_then(TrackerChoices::rule), Some(1));

        h.insert_one(entry(&["d"], 2));
        assert_eq!(h.len(), 3);
        assert_eq!(value(&h), "d");
        assert_eq!(h.cursor(), Some(2));
    }

    #[test]
    fn confirming_the_selected_option_never_grows_history() {
        let mut h = TrackerHistory::default();
        h.insert([entry(&["a", "e"], 0), entry(&["i"], 1)]);
        h.revert(0);
        assert_eq!(h.choose(0), Ok(false));
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), Some(1));
    }

    #[test]
    fn changing_the_selection_truncates_forward() {
        let mut h = TrackerHistory::default();
        h.insert([entry(&["a", "e"], 0), entry(&["i"], 1)]);
        h.revert(0);
        assert_eq!(h.choose(1), Ok(true));
        assert_eq!(h.len(), 1);
        assert_eq!(value(&h), "e");
        assert!(h.choose(5).is_err());
    }

    #[test]
    fn truncate_and_clear_report_drops() {
        let mut h = TrackerHistory::default();
        assert!(!h.clear());
        h.insert([entry(&["a"], 0), entry(&["b"], 1)]);
        h.revert(0);
        assert!(h.truncate_future());
        assert!(!h.truncate_future());
        assert!(h.clear());
        assert!(h.current().is_none());
    }

    #[test]
    fn materialize_swaps_only_the_selected_option() {
        let mut h = TrackerHistory::default();
        let pending = Choice::Sequence(vec![Segment::vowel("o")]);
        h.insert_one(TrackerChoices::new(
            vec![Choice::List(ListId(0)), pending.clone()],
            0,
            Some(0),
            "expand",
            None,
        ));
        assert_eq!(h.choose(1), Ok(true));
        assert_eq!(h.current_choice(), Some(&pending));

        h.materialize(Choice::List(ListId(1)));
        let entry = h.current().unwrap();
        assert_eq!(entry.choices(), &[Choice::List(ListId(0)), Choice::List(ListId(1))]);
        assert_eq!(entry.current(), 1);
    }
}
