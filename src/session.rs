use std::collections::VecDeque;

use log::{debug, info, trace};

use crate::config::{ConfigError, LocalGraphConfig};
use crate::extract::{Neighborhood, extract};
use crate::host::DocumentSource;
use crate::index::{DocumentChange, LinkIndex, Mutation};
use crate::interaction::{InputEvent, InteractionController};
use crate::layout::LayoutEngine;
use crate::snapshot::Snapshot;

/// Everything the host can report. Updates are applied in arrival order at
/// the start of the next tick, never during a layout step.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    DocumentChanged(DocumentChange),
    DocumentDeleted { id: String },
    FocalSelected { id: String },
    ViewportResized { width: f32, height: f32 },
    Input(InputEvent),
}

pub struct LocalGraph {
    config: LocalGraphConfig,
    index: LinkIndex,
    engine: LayoutEngine,
    controller: InteractionController,
    neighborhood: Option<Neighborhood>,
    queue: VecDeque<Update>,
    extractions: u64,
}

impl LocalGraph {
    pub fn new(config: LocalGraphConfig) -> Self {
        Self {
            index: LinkIndex::new(),
            engine: LayoutEngine::new(config.layout()),
            controller: InteractionController::new(
                config.max_hops,
                config.direction,
                config.drag_alpha,
            ),
            neighborhood: None,
            queue: VecDeque::new(),
            extractions: 0,
            config,
        }
    }

    /// Queues every document of `source` and focuses its active document.
    pub fn load_from(&mut self, source: &dyn DocumentSource) {
        let documents = source.documents();
        info!("loading {} documents", documents.len());
        self.queue
            .extend(documents.into_iter().map(Update::DocumentChanged));
        if let Some(id) = source.active_document() {
            self.queue.push_back(Update::FocalSelected { id });
        }
    }

    pub fn enqueue(&mut self, update: Update) {
        self.queue.push_back(update);
    }

    pub fn config(&self) -> &LocalGraphConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: LocalGraphConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.engine.set_config(config.layout());
        self.controller.set_drag_alpha(config.drag_alpha);
        if config.max_hops != self.controller.max_hops() {
            self.controller
                .handle(&mut self.engine, InputEvent::SetMaxHops(config.max_hops));
        }
        if config.direction != self.controller.direction() {
            self.controller
                .handle(&mut self.engine, InputEvent::SetDirection(config.direction));
        }
        self.config = config;
        Ok(())
    }

    pub fn index(&self) -> &LinkIndex {
        &self.index
    }

    pub fn neighborhood(&self) -> Option<&Neighborhood> {
        self.neighborhood.as_ref()
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn focal(&self) -> Option<&str> {
        self.controller.focal()
    }

    pub fn pending_updates(&self) -> usize {
        self.queue.len()
    }

    /// Number of extractions that were reconciled into the layout.
    pub fn extractions(&self) -> u64 {
        self.extractions
    }

    /// Applies queued updates and the latest extraction request without
    /// advancing the simulation.
    pub fn flush(&mut self) {
        self.controller.begin_tick();
        while let Some(update) = self.queue.pop_front() {
            self.apply(update);
        }
        self.apply_latest_request();
    }

    /// One host tick: queued updates, at most one reconcile, one layout step.
    /// A non-positive or non-finite `dt` falls back to `tickInterval`.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.flush();
        let dt = if dt.is_finite() && dt > 0.0 {
            dt
        } else {
            self.config.tick_interval
        };
        self.engine.step(dt)
    }

    /// Ticks at `tickInterval` until the layout converges. Returns the number
    /// of ticks run, or `None` if it never settled.
    pub fn settle(&mut self, max_ticks: usize) -> Option<usize> {
        let dt = self.config.tick_interval;
        (1..=max_ticks).find(|_| self.tick(dt))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.engine, self.controller.viewport(), self.focal())
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::DocumentChanged(change) => {
                let mutation = self.index.apply_change(change);
                self.note_mutation(&mutation);
            }
            Update::DocumentDeleted { id } => {
                if let Some(mutation) = self.index.remove_document(&id) {
                    self.note_mutation(&mutation);
                }
            }
            Update::FocalSelected { id } => {
                self.controller
                    .handle(&mut self.engine, InputEvent::Recenter { focal: id });
            }
            Update::ViewportResized { width, height } => {
                self.controller
                    .handle(&mut self.engine, InputEvent::Resize { width, height });
            }
            Update::Input(event) => self.controller.handle(&mut self.engine, event),
        }
    }

    fn note_mutation(&mut self, mutation: &Mutation) {
        let affected = self
            .neighborhood
            .as_ref()
            .is_some_and(|neighborhood| neighborhood.is_affected_by(mutation));
        if affected {
            debug!("mutation of {} touches the neighborhood", mutation.id);
            self.controller.refresh();
        } else {
            trace!("mutation of {} is out of range", mutation.id);
        }
    }

    fn apply_latest_request(&mut self) {
        let Some(request) = self.controller.take_request() else {
            return;
        };

        let neighborhood = extract(
            &self.index,
            &request.focal,
            request.max_hops,
            request.direction,
        );
        if !self.controller.is_current(&request) {
            debug!(
                "discarding extraction for {} (generation {} superseded)",
                request.focal, request.generation
            );
            return;
        }

        debug!(
            "extracted {} nodes, {} edges around {} ({} hops, {})",
            neighborhood.len(),
            neighborhood.edges.len(),
            request.focal,
            request.max_hops,
            request.direction
        );
        self.engine.reconcile(&neighborhood);
        self.controller.after_reconcile(&mut self.engine);
        self.neighborhood = Some(neighborhood);
        self.extractions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Direction;

    fn session() -> LocalGraph {
        let mut graph = LocalGraph::new(LocalGraphConfig::default());
        graph.enqueue(Update::DocumentChanged(DocumentChange::new("a", ["b"])));
        graph.enqueue(Update::DocumentChanged(DocumentChange::new("b", ["c"])));
        graph.enqueue(Update::DocumentChanged(DocumentChange::new("c", Vec::<String>::new())));
        graph.enqueue(Update::DocumentChanged(DocumentChange::new("far", ["farther"])));
        graph.enqueue(Update::FocalSelected { id: "a".into() });
        graph.flush();
        graph
    }

    #[test]
    fn focal_selection_extracts_once_per_tick() {
        let mut graph = session();
        assert_eq!(graph.extractions(), 1);
        assert_eq!(graph.focal(), Some("a"));

        graph.enqueue(Update::FocalSelected { id: "b".into() });
        graph.enqueue(Update::FocalSelected { id: "c".into() });
        graph.tick(1.0 / 60.0);

        assert_eq!(graph.extractions(), 2);
        let neighborhood = graph.neighborhood().expect("extracted");
        assert_eq!(neighborhood.focal, "c");
    }

    #[test]
    fn out_of_range_mutation_does_not_extract() {
        let mut graph = session();
        graph.enqueue(Update::DocumentChanged(DocumentChange::new("far", ["elsewhere"])));
        graph.flush();
        assert_eq!(graph.extractions(), 1);

        graph.enqueue(Update::DocumentChanged(DocumentChange::new("far", ["a"])));
        graph.flush();
        assert_eq!(graph.extractions(), 2);
        assert!(graph.neighborhood().is_some_and(|n| n.contains("far")));
    }

    #[test]
    fn deleting_a_neighbor_drops_it_from_the_layout() {
        let mut graph = session();
        assert!(graph.engine().contains("b"));

        graph.enqueue(Update::DocumentDeleted { id: "b".into() });
        graph.tick(1.0 / 60.0);
        assert!(!graph.engine().contains("b"));
        assert_eq!(graph.snapshot().nodes.len(), 1);
    }

    #[test]
    fn recreating_a_deleted_neighbor_brings_it_back() {
        let mut graph = session();
        graph.enqueue(Update::DocumentDeleted { id: "b".into() });
        graph.tick(1.0 / 60.0);
        assert!(!graph.engine().contains("b"));

        graph.enqueue(Update::DocumentChanged(DocumentChange::new("b", Vec::<String>::new())));
        graph.tick(1.0 / 60.0);

        assert_eq!(graph.extractions(), 3);
        let neighborhood = graph.neighborhood().expect("extracted");
        let fresh = extract(graph.index(), "a", 1, Direction::Both);
        assert!(neighborhood.same_topology(&fresh));
        assert!(neighborhood.node("b").is_some_and(|node| !node.missing));
        assert!(graph.engine().contains("b"));
    }

    #[test]
    fn config_changes_trigger_re_extraction() {
        let mut graph = session();
        let config = LocalGraphConfig {
            max_hops: 2,
            direction: Direction::Outgoing,
            ..LocalGraphConfig::default()
        };
        graph.set_config(config).expect("valid config");
        graph.flush();

        let neighborhood = graph.neighborhood().expect("extracted");
        assert_eq!(neighborhood.max_hops, 2);
        assert_eq!(neighborhood.direction, Direction::Outgoing);
        assert!(neighborhood.contains("c"));

        let invalid = LocalGraphConfig {
            max_hops: 0,
            ..LocalGraphConfig::default()
        };
        assert!(graph.set_config(invalid).is_err());
        assert_eq!(graph.config().max_hops, 2);
    }

    #[test]
    fn unknown_focal_still_renders_a_node() {
        let mut graph = session();
        graph.enqueue(Update::FocalSelected { id: "nowhere".into() });
        graph.tick(1.0 / 60.0);

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(snapshot.nodes[0].missing);
        assert_eq!(snapshot.focal.as_deref(), Some("nowhere"));
    }

    #[test]
    fn settle_converges_small_graphs() {
        let mut graph = session();
        assert!(graph.settle(5_000).is_some());
        assert!(graph.snapshot().converged);
    }
}
