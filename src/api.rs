use std::rc::Rc;

use crate::capture::Capture;
use crate::engine::{
    ChoiceSource, Graph, Layers, Registry, Rewriter, RuleConfig, RuleId, RunMetrics, SeededChoice, Side, TrackerHistory,
    TrackerId, View,
};
use crate::{Error, Result, Segment, Word};

/// Options that affect a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Seed of the default weighted choice source.
    pub seed: u64,
    /// Upper bound on rule evaluations per run. A rule pack whose rules keep
    /// undoing each other fails with [`Error::StepLimit`] instead of spinning.
    pub step_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { seed: 0, step_limit: 100_000 }
    }
}

/// Configuration phase of a [`WordManager`]: accepts rules, then freezes them.
#[derive(Debug)]
pub struct WordManagerBuilder {
    word: Word,
    layers: Layers,
    registry: Registry,
    options: Options,
    chooser: Option<Box<dyn ChoiceSource>>,
}

impl WordManagerBuilder {
    pub fn with_options(&mut self, options: Options) -> &mut Self {
        self.options = options;
        self
    }

    /// Replace the default [`SeededChoice`].
    pub fn with_choice_source(&mut self, chooser: Box<dyn ChoiceSource>) -> &mut Self {
        self.chooser = Some(chooser);
        self
    }

    /// Register a rule. Registration order is priority.
    pub fn add_rule(&mut self, config: RuleConfig) -> Result<RuleId> {
        self.registry.add(&self.layers, config)
    }

    /// Start a fluent rule definition bound to `layer`.
    pub fn capture(&mut self, layer: impl Into<String>) -> Capture<'_> {
        Capture::new(self, layer.into())
    }

    pub fn rule_count(&self) -> usize {
        self.registry.len()
    }

    pub fn layer_names(&self) -> &[String] {
        self.layers.names()
    }

    /// Freeze the rules and materialize the word.
    pub fn build(self) -> WordManager {
        let WordManagerBuilder { word, layers, registry, options, chooser } = self;
        let mut graph = Graph::new(layers.len(), word.context.clone());
        let root = graph.build_list(&word.segments, 0, None, Rc::new(word.meta.clone()), "Underlying.");
        let chooser = chooser.unwrap_or_else(|| Box::new(SeededChoice::new(options.seed)));
        let rewriter = Rewriter::new(graph, Rc::new(registry), root, chooser, options.step_limit);
        WordManager { word, layers, rewriter }
    }
}

/// Drives one word through the layer pipeline.
///
/// ```text
/// builder(word, layers) -> add_rule / capture ... -> build()
///                                                     │
///                       init() ── collect(layer) <────┘
///                         │
///                         └── choose / insert re-derive incrementally
/// ```
#[derive(Debug)]
pub struct WordManager {
    word: Word,
    layers: Layers,
    rewriter: Rewriter,
}

impl WordManager {
    /// Start configuring a manager for a copy of `word` over the ordered
    /// `layers`.
    pub fn builder<I, S>(word: &Word, layers: I) -> Result<WordManagerBuilder>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let layers = Layers::new(layers)?;
        Ok(WordManagerBuilder {
            word: word.ingest(),
            registry: Registry::new(layers.len()),
            layers,
            options: Options::default(),
            chooser: None,
        })
    }

    /// Apply the rules to every segment and run to a fixpoint.
    pub fn init(&mut self) -> Result<()> {
        self.init_with_metrics().map(|_| ())
    }

    pub fn init_with_metrics(&mut self) -> Result<RunMetrics> {
        self.rewriter.init()
    }

    /// The word at `layer`, nested expansions flattened in place.
    pub fn collect(&self, layer: &str) -> Result<Vec<Segment>> {
        self.rewriter.collect(self.layers.rank(layer)?)
    }

    pub fn collect_values(&self, layer: &str) -> Result<Vec<String>> {
        Ok(self.collect(layer)?.into_iter().map(|s| s.value).collect())
    }

    /// Select `option` of history entry `entry` of `tracker` at `layer`, then
    /// recompute whatever depends on it. Returns false when `option` was
    /// already selected.
    pub fn choose(&mut self, tracker: TrackerId, layer: &str, entry: usize, option: usize) -> Result<bool> {
        let rank = self.layers.rank(layer)?;
        self.rewriter.choose(tracker, rank, entry, option)
    }

    /// Insert `segment` next to `anchor` and recompute.
    pub fn insert(&mut self, anchor: TrackerId, side: Side, segment: Segment) -> Result<TrackerId> {
        self.rewriter.insert(anchor, side, segment)
    }

    pub fn history(&self, tracker: TrackerId, layer: &str) -> Result<&TrackerHistory> {
        self.rewriter.history(tracker, self.layers.rank(layer)?)
    }

    /// Top-level trackers of the word, in order.
    pub fn trackers(&self) -> Result<Vec<TrackerId>> {
        self.rewriter.graph().members(self.rewriter.root())
    }

    /// Trackers of the expansion `tracker` shows at `layer`, if it is expanded
    /// there.
    pub fn expansion(&self, tracker: TrackerId, layer: &str) -> Result<Option<Vec<TrackerId>>> {
        let rank = self.layers.rank(layer)?;
        let graph = self.rewriter.graph();
        if !graph.contains(tracker) {
            return Err(Error::InvalidEdit(format!("no tracker {tracker}")));
        }
        match graph.view(tracker, rank) {
            View::List(list) => graph.members(list).map(Some),
            View::Leaf(_) | View::Pending => Ok(None),
        }
    }

    /// Value of `tracker` at `layer`, if it has a plain segment there.
    pub fn segment(&self, tracker: TrackerId, layer: &str) -> Result<Option<&Segment>> {
        let rank = self.layers.rank(layer)?;
        let graph = self.rewriter.graph();
        if !graph.contains(tracker) {
            return Err(Error::InvalidEdit(format!("no tracker {tracker}")));
        }
        Ok(graph.segment_at(tracker, rank))
    }

    pub fn layer_names(&self) -> &[String] {
        self.layers.names()
    }

    pub fn word(&self) -> &Word {
        &self.word
    }
}
