use std::collections::HashMap;

use eframe::egui::{Pos2, Vec2, vec2};
use log::{debug, trace};

use crate::extract::Direction;
use crate::layout::LayoutEngine;

pub const MIN_ZOOM: f32 = 0.05;
pub const MAX_ZOOM: f32 = 6.0;

/// Screen mapping used by the renderer. Screen coordinates are relative to
/// the panel's top-left corner; world origin sits at the panel center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub size: Vec2,
    pub pan: Vec2,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            size: vec2(800.0, 600.0),
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn world_to_screen(&self, world: Vec2) -> Pos2 {
        (self.size * 0.5 + self.pan + world * self.zoom).to_pos2()
    }

    pub fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen.to_vec2() - self.size * 0.5 - self.pan) / self.zoom
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    DragStart { id: String },
    DragMove { id: String, x: f32, y: f32 },
    DragEnd { id: String },
    PinToggle { id: String },
    Recenter { focal: String },
    Zoom { factor: f32 },
    ZoomAt { factor: f32, anchor: Pos2 },
    Pan { dx: f32, dy: f32 },
    Resize { width: f32, height: f32 },
    SetMaxHops(usize),
    SetDirection(Direction),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub generation: u64,
    pub focal: String,
    pub max_hops: usize,
    pub direction: Direction,
}

#[derive(Clone, Debug)]
struct DragState {
    id: String,
    position: Vec2,
}

pub struct InteractionController {
    viewport: Viewport,
    focal: Option<String>,
    max_hops: usize,
    direction: Direction,
    drag_alpha: f32,
    drag: Option<DragState>,
    pins: HashMap<String, Vec2>,
    generation: u64,
    pending: Option<ExtractionRequest>,
    last_event: Option<InputEvent>,
}

impl InteractionController {
    pub fn new(max_hops: usize, direction: Direction, drag_alpha: f32) -> Self {
        Self {
            viewport: Viewport::default(),
            focal: None,
            max_hops: max_hops.max(1),
            direction,
            drag_alpha,
            drag: None,
            pins: HashMap::new(),
            generation: 0,
            pending: None,
            last_event: None,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn focal(&self) -> Option<&str> {
        self.focal.as_deref()
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn dragging(&self) -> Option<&str> {
        self.drag.as_ref().map(|drag| drag.id.as_str())
    }

    pub fn is_pin_persistent(&self, id: &str) -> bool {
        self.pins.contains_key(id)
    }

    pub fn set_drag_alpha(&mut self, drag_alpha: f32) {
        self.drag_alpha = drag_alpha;
    }

    /// Starts a new dedup window; called once per tick before queued input.
    pub fn begin_tick(&mut self) {
        self.last_event = None;
    }

    /// Applies one input event. An event identical to the one handled just
    /// before it in the same tick is dropped.
    pub fn handle(&mut self, engine: &mut LayoutEngine, event: InputEvent) {
        if self.last_event.as_ref() == Some(&event) {
            trace!("dropping repeated input within tick: {event:?}");
            return;
        }
        self.last_event = Some(event.clone());

        match event {
            InputEvent::DragStart { id } => self.drag_start(engine, id),
            InputEvent::DragMove { id, x, y } => self.drag_move(engine, &id, vec2(x, y)),
            InputEvent::DragEnd { id } => self.drag_end(engine, &id),
            InputEvent::PinToggle { id } => self.pin_toggle(engine, &id),
            InputEvent::Recenter { focal } => self.recenter(focal),
            InputEvent::Zoom { factor } => self.zoom_by(factor),
            InputEvent::ZoomAt { factor, anchor } => self.zoom_at(factor, anchor),
            InputEvent::Pan { dx, dy } => self.pan_by(vec2(dx, dy)),
            InputEvent::Resize { width, height } => self.resize(width, height),
            InputEvent::SetMaxHops(max_hops) => {
                let max_hops = max_hops.max(1);
                if max_hops != self.max_hops {
                    self.max_hops = max_hops;
                    self.refresh();
                }
            }
            InputEvent::SetDirection(direction) => {
                if direction != self.direction {
                    self.direction = direction;
                    self.refresh();
                }
            }
        }
    }

    pub fn on_drag_start(&mut self, engine: &mut LayoutEngine, id: &str) {
        self.handle(engine, InputEvent::DragStart { id: id.to_owned() });
    }

    pub fn on_drag_move(&mut self, engine: &mut LayoutEngine, id: &str, x: f32, y: f32) {
        self.handle(
            engine,
            InputEvent::DragMove {
                id: id.to_owned(),
                x,
                y,
            },
        );
    }

    pub fn on_drag_end(&mut self, engine: &mut LayoutEngine, id: &str) {
        self.handle(engine, InputEvent::DragEnd { id: id.to_owned() });
    }

    pub fn on_pin_toggle(&mut self, engine: &mut LayoutEngine, id: &str) {
        self.handle(engine, InputEvent::PinToggle { id: id.to_owned() });
    }

    pub fn on_recenter(&mut self, engine: &mut LayoutEngine, focal: &str) {
        self.handle(
            engine,
            InputEvent::Recenter {
                focal: focal.to_owned(),
            },
        );
    }

    pub fn on_zoom(&mut self, engine: &mut LayoutEngine, factor: f32) {
        self.handle(engine, InputEvent::Zoom { factor });
    }

    pub fn on_pan(&mut self, engine: &mut LayoutEngine, dx: f32, dy: f32) {
        self.handle(engine, InputEvent::Pan { dx, dy });
    }

    fn drag_start(&mut self, engine: &mut LayoutEngine, id: String) {
        let Some(position) = engine.position(&id) else {
            debug!("ignoring drag start on {id}: not in the current layout");
            return;
        };
        if let Some(previous) = self.drag.take()
            && previous.id != id
        {
            self.finish_drag(engine, previous);
        }

        engine.pin_at(&id, position);
        engine.reheat(self.drag_alpha);
        self.drag = Some(DragState { id, position });
    }

    fn drag_move(&mut self, engine: &mut LayoutEngine, id: &str, position: Vec2) {
        let Some(drag) = self.drag.as_mut().filter(|drag| drag.id == id) else {
            debug!("ignoring drag move on {id}: no drag in progress");
            return;
        };
        if !engine.pin_at(id, position) {
            return;
        }
        drag.position = position;
        engine.reheat(self.drag_alpha);
    }

    fn drag_end(&mut self, engine: &mut LayoutEngine, id: &str) {
        match self.drag.take() {
            Some(drag) if drag.id == id => self.finish_drag(engine, drag),
            other => self.drag = other,
        }
    }

    fn finish_drag(&mut self, engine: &mut LayoutEngine, drag: DragState) {
        if let Some(pin) = self.pins.get_mut(&drag.id) {
            *pin = drag.position;
        } else {
            engine.release(&drag.id);
        }
    }

    fn pin_toggle(&mut self, engine: &mut LayoutEngine, id: &str) {
        let Some(position) = engine.position(id) else {
            debug!("ignoring pin toggle on {id}: not in the current layout");
            return;
        };

        if self.pins.remove(id).is_some() {
            if self.dragging() != Some(id) {
                engine.release(id);
                engine.reheat(self.drag_alpha);
            }
        } else {
            self.pins.insert(id.to_owned(), position);
            engine.pin_at(id, position);
        }
    }

    fn recenter(&mut self, focal: String) {
        if self.focal.as_deref() == Some(focal.as_str()) && self.pending.is_none() {
            return;
        }
        self.focal = Some(focal);
        self.refresh();
    }

    fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.viewport.zoom = (self.viewport.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    /// Zooms while keeping the world point under `anchor` fixed on screen.
    fn zoom_at(&mut self, factor: f32, anchor: Pos2) {
        if !factor.is_finite() || factor <= 0.0 || !anchor.x.is_finite() || !anchor.y.is_finite() {
            return;
        }
        let world_before = self.viewport.screen_to_world(anchor);
        self.zoom_by(factor);
        self.viewport.pan =
            anchor.to_vec2() - self.viewport.size * 0.5 - world_before * self.viewport.zoom;
    }

    fn pan_by(&mut self, delta: Vec2) {
        if delta.is_finite() {
            self.viewport.pan += delta;
        }
    }

    fn resize(&mut self, width: f32, height: f32) {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            self.viewport.size = vec2(width, height);
        }
    }

    /// Queues an extraction for the current focal and settings, superseding
    /// any request that has not been applied yet.
    pub fn refresh(&mut self) {
        let Some(focal) = self.focal.clone() else {
            return;
        };
        self.generation += 1;
        self.pending = Some(ExtractionRequest {
            generation: self.generation,
            focal,
            max_hops: self.max_hops,
            direction: self.direction,
        });
    }

    pub fn take_request(&mut self) -> Option<ExtractionRequest> {
        self.pending.take()
    }

    pub fn is_current(&self, request: &ExtractionRequest) -> bool {
        request.generation == self.generation && self.pending.is_none()
    }

    /// Re-applies persistent pins and the active drag after the layout
    /// picked up a new neighborhood.
    pub fn after_reconcile(&mut self, engine: &mut LayoutEngine) {
        for (id, position) in &self.pins {
            if engine.contains(id) {
                engine.pin_at(id, *position);
            }
        }

        if let Some(drag) = &self.drag {
            if engine.contains(&drag.id) {
                engine.pin_at(&drag.id, drag.position);
            } else {
                debug!("drag target {} left the neighborhood", drag.id);
                self.drag = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;
    use crate::config::LocalGraphConfig;
    use crate::extract::extract;
    use crate::index::LinkIndex;

    fn setup() -> (InteractionController, LayoutEngine) {
        let mut index = LinkIndex::new();
        index.upsert_document("a", ["b", "c"]);
        index.upsert_document("b", ["c"]);
        index.upsert_document("c", Vec::<String>::new());

        let config = LocalGraphConfig::default();
        let mut engine = LayoutEngine::new(config.layout());
        engine.reconcile(&extract(&index, "a", 1, Direction::Both));
        (
            InteractionController::new(config.max_hops, config.direction, config.drag_alpha),
            engine,
        )
    }

    #[test]
    fn drag_pins_temporarily() {
        let (mut controller, mut engine) = setup();

        controller.on_drag_start(&mut engine, "b");
        controller.on_drag_move(&mut engine, "b", 40.0, -10.0);
        for _ in 0..10 {
            engine.step(1.0 / 60.0);
            assert_eq!(engine.position("b"), Some(vec2(40.0, -10.0)));
        }
        controller.on_drag_end(&mut engine, "b");
        assert!(!engine.is_pinned("b"));
        assert_eq!(controller.dragging(), None);
    }

    #[test]
    fn persistent_pin_moves_with_drag_and_survives_release() {
        let (mut controller, mut engine) = setup();

        controller.on_pin_toggle(&mut engine, "c");
        assert!(engine.is_pinned("c"));
        controller.begin_tick();
        controller.on_drag_start(&mut engine, "c");
        controller.on_drag_move(&mut engine, "c", 5.0, 6.0);
        controller.on_drag_end(&mut engine, "c");

        assert!(engine.is_pinned("c"));
        assert_eq!(engine.position("c"), Some(vec2(5.0, 6.0)));

        controller.begin_tick();
        controller.on_pin_toggle(&mut engine, "c");
        assert!(!engine.is_pinned("c"));
    }

    #[test]
    fn repeated_identical_calls_within_a_tick_are_ignored() {
        let (mut controller, mut engine) = setup();

        controller.on_pin_toggle(&mut engine, "b");
        controller.on_pin_toggle(&mut engine, "b");
        assert!(engine.is_pinned("b"));

        controller.on_zoom(&mut engine, 2.0);
        controller.on_zoom(&mut engine, 2.0);
        assert_eq!(controller.viewport().zoom, 2.0);

        controller.begin_tick();
        controller.on_zoom(&mut engine, 2.0);
        assert_eq!(controller.viewport().zoom, 4.0);
    }

    #[test]
    fn interleaved_repeats_are_applied() {
        let (mut controller, mut engine) = setup();

        controller.on_drag_start(&mut engine, "b");
        controller.on_drag_end(&mut engine, "b");
        controller.on_drag_start(&mut engine, "b");
        assert_eq!(controller.dragging(), Some("b"));
        assert!(engine.is_pinned("b"));

        controller.on_zoom(&mut engine, 2.0);
        controller.on_pan(&mut engine, 1.0, 0.0);
        controller.on_zoom(&mut engine, 2.0);
        assert_eq!(controller.viewport().zoom, 4.0);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let (mut controller, mut engine) = setup();
        let before = engine.nodes().to_vec();

        controller.on_drag_start(&mut engine, "ghost");
        controller.on_drag_move(&mut engine, "ghost", 1.0, 1.0);
        controller.on_pin_toggle(&mut engine, "ghost");

        assert_eq!(controller.dragging(), None);
        assert!(engine.nodes().iter().zip(&before).all(|(a, b)| a.position == b.position));
        assert!(engine.nodes().iter().all(|node| !node.is_pinned()));
    }

    #[test]
    fn zoom_and_pan_leave_node_positions_alone() {
        let (mut controller, mut engine) = setup();
        let before = engine.position("a");

        controller.on_zoom(&mut engine, 50.0);
        assert_eq!(controller.viewport().zoom, MAX_ZOOM);
        controller.on_pan(&mut engine, 15.0, -5.0);
        assert_eq!(controller.viewport().pan, vec2(15.0, -5.0));
        assert_eq!(engine.position("a"), before);
    }

    #[test]
    fn zoom_at_keeps_anchor_fixed() {
        let (mut controller, mut engine) = setup();
        let anchor = pos2(620.0, 180.0);
        let world = controller.viewport().screen_to_world(anchor);

        controller.handle(&mut engine, InputEvent::ZoomAt { factor: 1.5, anchor });
        let after = controller.viewport().world_to_screen(world);
        assert!((after - anchor).length() < 1e-3);
    }

    #[test]
    fn recenter_supersedes_pending_requests() {
        let (mut controller, mut engine) = setup();

        controller.on_recenter(&mut engine, "a");
        controller.on_recenter(&mut engine, "b");
        controller.handle(&mut engine, InputEvent::SetMaxHops(3));

        let request = controller.take_request().expect("request queued");
        assert_eq!(request.focal, "b");
        assert_eq!(request.max_hops, 3);
        assert_eq!(request.direction, Direction::Both);
        assert!(controller.is_current(&request));
        assert!(controller.take_request().is_none());
    }
}
