//! Built-in pattern language.
//!
//! The engine treats matching as an oracle: a [`Predicate`] answers "does this
//! segment match" and a [`Condition`] answers "does this environment match".
//! Both must be pure since the engine re-evaluates them speculatively every
//! time a tracker is replayed.
//!
//! Conditions only read the environment through [`Environment`], which is
//! what records the dependency edges. Combinators short-circuit, so a
//! condition only depends on the relations it actually inspected.

use regex::Regex;

use crate::engine::{Environment, Lookup, Relation};
use crate::{Feature, Result, Segment, SegmentKind};

/// Matches a single segment value.
#[derive(Debug, Clone)]
pub enum Predicate {
    Any,
    Kind(SegmentKind),
    Value(String),
    /// Match the raw value against a regular expression. The `Regex` is a
    /// static reference, usually created through the `regex!` macro.
    ValueRegex(&'static Regex),
    /// The segment carries `name` with exactly this value.
    Feature(String, Feature),
    All(Vec<Predicate>),
    AnyOf(Vec<Predicate>),
    Not(Box<Predicate>),
    Custom(fn(&Segment) -> bool),
}

impl Predicate {
    pub fn kind(kind: SegmentKind) -> Self {
        Predicate::Kind(kind)
    }

    pub fn value(value: impl Into<String>) -> Self {
        Predicate::Value(value.into())
    }

    pub fn feature(name: impl Into<String>, value: impl Into<Feature>) -> Self {
        Predicate::Feature(name.into(), value.into())
    }

    pub fn consonant() -> Self {
        Predicate::Kind(SegmentKind::Consonant)
    }

    pub fn vowel() -> Self {
        Predicate::Kind(SegmentKind::Vowel)
    }

    /// Conjunction that flattens nested `All`s.
    pub fn and(self, other: Predicate) -> Self {
        match (self, other) {
            (Predicate::Any, p) | (p, Predicate::Any) => p,
            (Predicate::All(mut a), Predicate::All(b)) => {
                a.extend(b);
                Predicate::All(a)
            }
            (Predicate::All(mut a), p) => {
                a.push(p);
                Predicate::All(a)
            }
            (p, q) => Predicate::All(vec![p, q]),
        }
    }

    pub fn matches(&self, segment: &Segment) -> bool {
        match self {
            Predicate::Any => true,
            Predicate::Kind(kind) => &segment.kind == kind,
            Predicate::Value(value) => &segment.value == value,
            Predicate::ValueRegex(re) => re.is_match(&segment.value),
            Predicate::Feature(name, value) => segment.features.get(name) == Some(value),
            Predicate::All(ps) => ps.iter().all(|p| p.matches(segment)),
            Predicate::AnyOf(ps) => ps.iter().any(|p| p.matches(segment)),
            Predicate::Not(p) => !p.matches(segment),
            Predicate::Custom(f) => f(segment),
        }
    }
}

/// Matches a tracker's environment at one layer.
#[derive(Debug, Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    /// The related segment exists, is resolved, and matches.
    Neighbor(Relation, Predicate),
    /// Resolution ran into the edge of the word.
    Missing(Relation),
    /// The related segment exists but has not reached this layer yet.
    Pending(Relation),
    /// Evaluate the inner condition in the related segment's own environment.
    Through(Relation, Box<Condition>),
    /// Word metadata key equals the value.
    Word(String, Feature),
    /// The word carries this context tag.
    Context(String),
    All(Vec<Condition>),
    AnyOf(Vec<Condition>),
    Not(Box<Condition>),
    Custom(fn(&mut Environment<'_>) -> Result<bool>),
}

impl Condition {
    /// The segment sits right before something matching `p`.
    pub fn before(p: Predicate) -> Self {
        Condition::Neighbor(Relation::Next, p)
    }

    /// The segment sits right after something matching `p`.
    pub fn after(p: Predicate) -> Self {
        Condition::Neighbor(Relation::Prev, p)
    }

    pub fn word_initial() -> Self {
        Condition::Missing(Relation::Prev)
    }

    pub fn word_final() -> Self {
        Condition::Missing(Relation::Next)
    }

    pub fn word(key: impl Into<String>, value: impl Into<Feature>) -> Self {
        Condition::Word(key.into(), value.into())
    }

    pub fn through(relation: Relation, inner: Condition) -> Self {
        Condition::Through(relation, Box::new(inner))
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::Always, c) | (c, Condition::Always) => c,
            (Condition::All(mut a), c) => {
                a.push(c);
                Condition::All(a)
            }
            (c, d) => Condition::All(vec![c, d]),
        }
    }

    pub fn evaluate(&self, env: &mut Environment<'_>) -> Result<bool> {
        Ok(match self {
            Condition::Always => true,
            Condition::Neighbor(rel, p) => env.neighbor(*rel)?.is_some_and(|s| p.matches(s)),
            Condition::Missing(rel) => matches!(env.lookup(*rel)?, Lookup::Missing),
            Condition::Pending(rel) => matches!(env.lookup(*rel)?, Lookup::Pending(_)),
            Condition::Through(rel, inner) => match env.through(*rel)? {
                Some(mut there) => inner.evaluate(&mut there)?,
                None => false,
            },
            Condition::Word(key, value) => env.word().get(key) == Some(value),
            Condition::Context(tag) => env.context().contains(tag),
            Condition::All(cs) => {
                for c in cs {
                    if !c.evaluate(env)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::AnyOf(cs) => {
                for c in cs {
                    if c.evaluate(env)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(c) => !c.evaluate(env)?,
            Condition::Custom(f) => f(env)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_combinators() {
        let k = Segment::consonant("k").with("emphatic", true);
        assert!(Predicate::consonant().and(Predicate::value("k")).matches(&k));
        assert!(Predicate::feature("emphatic", true).matches(&k));
        assert!(!Predicate::feature("emphatic", false).matches(&k));
        assert!(Predicate::Not(Box::new(Predicate::vowel())).matches(&k));
        assert!(Predicate::ValueRegex(regex!(r"^[kq]$")).matches(&k));
        assert!(Predicate::AnyOf(vec![Predicate::vowel(), Predicate::value("k")]).matches(&k));
    }

    #[test]
    fn and_flattens() {
        let p = Predicate::Any.and(Predicate::vowel()).and(Predicate::value("a")).and(Predicate::feature("long", false));
        match p {
            Predicate::All(ps) => assert_eq!(ps.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
        assert!(matches!(Condition::Always.and(Condition::word_final()), Condition::Missing(Relation::Next)));
    }
}
