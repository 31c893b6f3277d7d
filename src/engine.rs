//! Rewrite engine.
//!
//! This module is the internal entry point of the engine. The public surface
//! (`WordManager`) lives in `api.rs` and only talks to the `Rewriter`; the
//! submodules under `src/engine/` each own one concern.
//!
//! ## How the parts work together
//!
//! ```text
//! RuleConfig ── Registry::add ──> Rc<Registry>          (registry.rs)
//!                                      │ frozen at build()
//! Word ── Graph::build_list ──> trackers + lists        (graph.rs)
//!                                      │
//!                                      v
//!                         Rewriter::drain  (rewriter.rs)
//!                           - pop (tracker, layer)       (queue.rs)
//!                           - replay / scan rules
//!                           - conditions read an Environment
//!                               (environment.rs)
//!                             which resolves relations lazily
//!                               (resolve.rs)
//!                           - decisions recorded in TrackerHistory
//!                               (history.rs)
//!                           - candidates picked by a ChoiceSource
//!                               (choice.rs)
//!                                      │
//!                                      v
//!                         Rewriter::collect -> Vec<Segment>
//! ```
//!
//! The engine leans on **incremental recomputation**: every relation a rule
//! condition reads is memoized and leaves a dependency edge behind. When a
//! segment changes, only the trackers that looked at it are replayed, and a
//! replay that reaches the same decisions confirms them instead of redoing
//! them.
//!
//! ## Responsibilities by module
//!
//! - `registry.rs`: layer ranks, rule normalization and validation, per-layer
//!   rule index.
//! - `graph.rs`: tracker and list arena, sibling walks, liveness.
//! - `resolve.rs`: relation kinds and the memoized neighbor walk.
//! - `environment.rs`: the condition-facing view of a tracker.
//! - `history.rs`: per-layer decision timelines with a cursor.
//! - `queue.rs`: FIFO of pending scans.
//! - `choice.rs`: weighted candidate selection.
//! - `rewriter.rs`: scanning, firing, invalidation, replay.
//! - `metrics.rs`: counters for a run.
//!
//! ## Debugging
//!
//! The engine logs through `tracing`: rule firings and replays at `debug`,
//! relation resolution and queue traffic at `trace`.

#[path = "engine/choice.rs"]
mod choice;
#[path = "engine/environment.rs"]
mod environment;
#[path = "engine/graph.rs"]
mod graph;
#[path = "engine/history.rs"]
mod history;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/queue.rs"]
mod queue;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/rewriter.rs"]
mod rewriter;

pub use choice::{ChoiceSource, FirstChoice, SeededChoice};
pub use environment::Environment;
pub use graph::{ListId, Side, TrackerId};
pub use history::{Choice, TrackerChoices, TrackerHistory};
pub use metrics::RunMetrics;
pub use registry::{Action, Outcome, OutcomeSpec, RuleConfig, RuleId};
pub use resolve::{Lookup, Relation, Relations};

pub(crate) use graph::{Graph, View};
pub(crate) use registry::{Layers, Registry};
pub(crate) use rewriter::Rewriter;
