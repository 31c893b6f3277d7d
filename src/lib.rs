//! A layered segment rewrite engine.
//!
//! A [`Word`] is a sequence of [`Segment`]s that is pushed through an ordered
//! pipeline of layers (for example `underlying` then `phonic`). Rules bound to
//! a layer transform a segment in place, promote it to the next layer, or
//! expand it into a nested sub-sequence that re-enters the pipeline. Rules can
//! look at neighboring segments; those lookups are resolved lazily, memoized,
//! and recomputed when the neighbor changes.
//!
//! ```
//! use strata::{Action, Segment, SegmentKind, Word, WordManager, rule};
//!
//! let word = Word::new("noun", Default::default(), vec![Segment::new(SegmentKind::Vowel, "a")]);
//! let mut builder = WordManager::builder(&word, ["underlying"]).unwrap();
//! builder
//!     .add_rule(rule! {
//!         layer: "underlying",
//!         trigger: strata::Predicate::value("a"),
//!         action: Action::Transform,
//!         into: [Segment::new(SegmentKind::Vowel, "aa")],
//!         because: "lengthening",
//!     })
//!     .unwrap();
//! let mut manager = builder.build();
//! manager.init().unwrap();
//! assert_eq!(manager.collect_values("underlying").unwrap(), vec!["aa"]);
//! ```

extern crate self as strata;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[macro_use]
mod macros;
mod api;
mod capture;
mod engine;
mod error;
mod pattern;


pub use api::{Options, WordManager, WordManagerBuilder};
pub use capture::{Capture, CaptureApplier};
pub use engine::{
    Action, ChoiceSource, Choice, Environment, FirstChoice, ListId, Lookup, Outcome, OutcomeSpec, Relation,
    Relations, RuleConfig, RuleId, RunMetrics, SeededChoice, Side, TrackerChoices, TrackerHistory, TrackerId,
};
pub use error::{Error, Result};
pub use pattern::{Condition, Predicate};

// --- Segment model ----------------------------------------------------------

/// Type tag of a segment.
///
/// Only consonants and vowels carry meaning for the engine (they drive the
/// filtered neighbor relations); every other tag passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentKind {
    Consonant,
    Vowel,
    Epenthetic,
    Prefix,
    Suffix,
    Augmentation,
    Boundary,
    /// Any tag supplied by an alphabet the engine knows nothing about.
    Other(String),
}

impl SegmentKind {
    pub fn name(&self) -> &str {
        match self {
            SegmentKind::Consonant => "consonant",
            SegmentKind::Vowel => "vowel",
            SegmentKind::Epenthetic => "epenthetic",
            SegmentKind::Prefix => "prefix",
            SegmentKind::Suffix => "suffix",
            SegmentKind::Augmentation => "augmentation",
            SegmentKind::Boundary => "boundary",
            SegmentKind::Other(name) => name,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A feature value attached to a segment or to word metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Flag(bool),
    Number(i64),
    Text(String),
}

impl From<bool> for Feature {
    fn from(v: bool) -> Self {
        Feature::Flag(v)
    }
}

impl From<i64> for Feature {
    fn from(v: i64) -> Self {
        Feature::Number(v)
    }
}

impl From<&str> for Feature {
    fn from(v: &str) -> Self {
        Feature::Text(v.to_string())
    }
}

impl From<String> for Feature {
    fn from(v: String) -> Self {
        Feature::Text(v)
    }
}

/// Word-level metadata (and segment features) keyed by name.
pub type Metadata = BTreeMap<String, Feature>;

/// Smallest typed unit of a word at a given layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: SegmentKind,
    pub features: Metadata,
    pub value: String,
}

impl Segment {
    /// Create a featureless segment.
    pub fn new(kind: SegmentKind, value: impl Into<String>) -> Self {
        Segment { kind, features: Metadata::new(), value: value.into() }
    }

    pub fn consonant(value: impl Into<String>) -> Self {
        Self::new(SegmentKind::Consonant, value)
    }

    pub fn vowel(value: impl Into<String>) -> Self {
        Self::new(SegmentKind::Vowel, value)
    }

    /// Builder-style feature setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Feature>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.value)
    }
}

// --- Word model -------------------------------------------------------------

/// The caller-facing word template.
///
/// The engine copies it on ingestion; later edits to the caller's `Word` are
/// never observed by a running [`WordManager`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    pub kind: String,
    pub meta: Metadata,
    pub segments: Vec<Segment>,
    pub context: BTreeSet<String>,
}

impl Word {
    pub fn new(kind: impl Into<String>, meta: Metadata, segments: Vec<Segment>) -> Self {
        Word { kind: kind.into(), meta, segments, context: BTreeSet::new() }
    }

    /// Same as [`Word::new`], with context tags.
    pub fn with_context<I, S>(kind: impl Into<String>, meta: Metadata, segments: Vec<Segment>, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Word { kind: kind.into(), meta, segments, context: context.into_iter().map(Into::into).collect() }
    }

    /// Deep copy used at ingestion. No normalization takes place, malformed
    /// segments pass through as they are.
    pub(crate) fn ingest(&self) -> Word {
        self.clone()
    }
}
