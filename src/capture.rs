//! Fluent rule definitions.
//!
//! ```text
//! builder.capture("underlying")      Capture (layer bound)
//!        .vowel()                    CaptureApplier (trigger bound)
//!        .value("a")                   refine trigger
//!        .when(Condition::word_final())
//!        .because("final lengthening")
//!        .transform([Segment::vowel("aa")])?;   -> RuleConfig -> add_rule
//! ```
//!
//! Nothing is validated before the verb runs; layer and outcome errors come
//! back from the verb exactly as `WordManagerBuilder::add_rule` reports them.

use crate::api::WordManagerBuilder;
use crate::engine::{Action, Outcome, OutcomeSpec, RuleConfig, RuleId};
use crate::{Condition, Feature, Predicate, Result, Segment, SegmentKind};

/// Rule definitions bound to one layer.
#[derive(Debug)]
pub struct Capture<'b> {
    builder: &'b mut WordManagerBuilder,
    layer: String,
}

impl<'b> Capture<'b> {
    pub(crate) fn new(builder: &'b mut WordManagerBuilder, layer: String) -> Self {
        Capture { builder, layer }
    }

    /// Trigger on any segment matching `trigger`.
    pub fn segment(&mut self, trigger: Predicate) -> CaptureApplier<'_> {
        CaptureApplier {
            builder: &mut *self.builder,
            layer: self.layer.clone(),
            trigger,
            condition: None,
            reason: None,
        }
    }

    pub fn consonant(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::consonant())
    }

    pub fn vowel(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::vowel())
    }

    pub fn epenthetic(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::kind(SegmentKind::Epenthetic))
    }

    pub fn prefix(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::kind(SegmentKind::Prefix))
    }

    pub fn suffix(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::kind(SegmentKind::Suffix))
    }

    pub fn augmentation(&mut self) -> CaptureApplier<'_> {
        self.segment(Predicate::kind(SegmentKind::Augmentation))
    }
}

/// A rule under construction; one of the verbs registers it.
#[derive(Debug)]
pub struct CaptureApplier<'c> {
    builder: &'c mut WordManagerBuilder,
    layer: String,
    trigger: Predicate,
    condition: Option<Condition>,
    reason: Option<String>,
}

impl CaptureApplier<'_> {
    /// Only segments carrying `feature` with exactly `value`.
    pub fn only(mut self, feature: impl Into<String>, value: impl Into<Feature>) -> Self {
        self.trigger = self.trigger.and(Predicate::feature(feature, value));
        self
    }

    /// Only segments whose value is `value`.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.trigger = self.trigger.and(Predicate::value(value));
        self
    }

    /// Environment precondition. Repeated calls are conjoined.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(c) => c.and(condition),
            None => condition,
        });
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn transform(self, into: impl IntoIterator<Item = Segment>) -> Result<RuleId> {
        self.register(Action::Transform, segments(into))
    }

    pub fn transform_weighted(self, into: impl IntoIterator<Item = (Segment, f64)>) -> Result<RuleId> {
        self.register(Action::Transform, weighted(into))
    }

    /// Seed the next layer. No outcomes carries the current value forward.
    pub fn promote(self, into: impl IntoIterator<Item = Segment>) -> Result<RuleId> {
        self.register(Action::Promote, segments(into))
    }

    pub fn promote_weighted(self, into: impl IntoIterator<Item = (Segment, f64)>) -> Result<RuleId> {
        self.register(Action::Promote, weighted(into))
    }

    /// Replace the segment at the next layer by one of `into`. An empty
    /// sequence deletes it.
    pub fn expand(self, into: impl IntoIterator<Item = Vec<Segment>>) -> Result<RuleId> {
        self.register(Action::Expand, OutcomeSpec::List(into.into_iter().map(Outcome::Sequence).collect()))
    }

    pub fn expand_weighted(self, into: impl IntoIterator<Item = (Vec<Segment>, f64)>) -> Result<RuleId> {
        self.register(Action::Expand, weighted(into))
    }

    fn register(self, action: Action, outcomes: OutcomeSpec) -> Result<RuleId> {
        let reason = self.reason.unwrap_or_else(|| format!("{} rule {}", self.layer, self.builder.rule_count()));
        self.builder.add_rule(RuleConfig {
            layer: self.layer,
            trigger: self.trigger,
            condition: self.condition,
            action,
            outcomes,
            reason,
        })
    }
}

fn segments(into: impl IntoIterator<Item = Segment>) -> OutcomeSpec {
    OutcomeSpec::List(into.into_iter().map(Outcome::Segment).collect())
}

fn weighted<O: Into<Outcome>>(into: impl IntoIterator<Item = (O, f64)>) -> OutcomeSpec {
    OutcomeSpec::Weighted(into.into_iter().map(|(o, w)| (o.into(), w)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Word, WordManager};

    fn builder() -> WordManagerBuilder {
        let word = Word::new("noun", Default::default(), vec![Segment::consonant("k"), Segment::vowel("a")]);
        WordManager::builder(&word, ["underlying", "phonic"]).unwrap()
    }

    #[test]
    fn verbs_register_in_order() {
        let mut b = builder();
        let mut underlying = b.capture("underlying");
        assert_eq!(underlying.vowel().value("a").because("lengthen").transform([Segment::vowel("aa")]), Ok(0));
        assert_eq!(underlying.consonant().promote([]), Ok(1));
        assert_eq!(underlying.segment(Predicate::Any).expand([vec![], vec![Segment::vowel("e")]]), Ok(2));
        assert_eq!(b.rule_count(), 3);
    }

    #[test]
    fn errors_surface_at_the_verb() {
        let mut b = builder();
        let err = b.capture("surface").vowel().transform([Segment::vowel("e")]);
        assert_eq!(err, Err(Error::UnknownLayer("surface".to_string())));
        let err = b.capture("phonic").vowel().promote([]);
        assert!(matches!(err, Err(Error::InvalidRule(_))));
        assert_eq!(b.rule_count(), 0);
    }

    #[test]
    fn refinements_narrow_the_trigger() {
        let mut b = builder();
        b.capture("underlying")
            .vowel()
            .only("stressed", true)
            .when(Condition::word_final())
            .when(Condition::after(Predicate::consonant()))
            .transform_weighted([(Segment::vowel("e"), 1.0), (Segment::vowel("i"), 3.0)])
            .unwrap();
        let mut m = b.build();
        m.init().unwrap();
        // "a" is not stressed, the rule never fires
        assert_eq!(m.collect_values("underlying").unwrap(), vec!["k", "a"]);
    }
}
