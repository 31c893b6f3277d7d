//! Engine run metrics.
//!
//! Counters are collected for every public run (`init`, `choose`, `insert`)
//! and are cheap enough to stay on. `WordManager::init_with_metrics` hands
//! them out; the other entry points drop them.
//!
//! ## Reading the numbers
//!
//! - `fired` counts rules whose trigger and condition matched, `confirmed`
//!   the subset that merely reproduced a recorded decision. A replay that
//!   confirms everything costs evaluation but changes nothing.
//! - `passes` counts tasks drained from the queue; `replays` the ones that
//!   actually rescanned a recorded history.

use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    /// Wall time of the run, queue drained.
    pub total: Duration,
    pub passes: usize,
    pub fired: usize,
    pub confirmed: usize,
    pub replays: usize,
}
