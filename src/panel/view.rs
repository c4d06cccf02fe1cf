use eframe::egui::{
    self, Align, Align2, Color32, Context, FontId, Layout, PointerButton, Pos2, Rect, Response,
    Sense, Stroke, Ui, vec2,
};

use local_graph::{InputEvent, Snapshot, Update};

use super::PanelModel;
use super::render_utils::{
    circle_visible, draw_background, edge_visible, hop_color, screen_radius,
};

const PINNED_RING: Color32 = Color32::from_rgb(241, 146, 94);
const SELECTED_RING: Color32 = Color32::from_rgb(245, 245, 245);

impl PanelModel {
    pub(in crate::panel) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Local graph");
                    ui.separator();
                    ui.label(format!("vault: {}", self.vault.root().display()));
                    ui.label(format!("documents: {}", self.vault.len()));
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload vault"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.status_text());
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));
    }

    fn status_text(&self) -> String {
        let engine = self.graph.engine();
        let state = if engine.is_converged() {
            "settled"
        } else {
            "simulating"
        };
        format!(
            "{} nodes  |  {} edges  |  {state}",
            engine.nodes().len(),
            engine.edges().len()
        )
    }

    fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        let viewport = *self.graph.controller().viewport();
        if viewport.size != rect.size() {
            self.graph.enqueue(Update::ViewportResized {
                width: rect.width(),
                height: rect.height(),
            });
        }

        // Hit testing runs against last frame's positions, which is what the
        // user is looking at.
        let hovered = self.hovered_id(ui, rect);
        self.handle_pointer(ui, rect, &response, hovered.as_deref());

        if self.live_physics {
            let dt = ui
                .ctx()
                .input(|input| input.stable_dt)
                .clamp(1.0 / 240.0, 1.0 / 20.0);
            self.graph.tick(dt);
        } else {
            self.graph.flush();
        }

        let snapshot = self.graph.snapshot();
        let zoom = snapshot.viewport.zoom;
        let pan = vec2(snapshot.viewport.pan_x, snapshot.viewport.pan_y);
        draw_background(&painter, rect, pan, zoom);

        self.update_screen_space(rect, &snapshot);
        if self.show_quadtree_overlay {
            self.draw_quadtree_overlay(&painter, rect);
        }
        self.draw_edges(&painter, rect, &snapshot);
        self.draw_nodes(&painter, rect, &snapshot, hovered.as_deref());

        if hovered.is_some() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
        if !snapshot.converged || response.dragged() {
            ui.ctx().request_repaint();
        }
    }

    fn update_screen_space(&mut self, rect: Rect, snapshot: &Snapshot) {
        let viewport = self.graph.controller().viewport();
        let scratch = &mut self.view_scratch;
        scratch.screen_positions.clear();
        scratch.screen_radii.clear();
        for node in &snapshot.nodes {
            let screen = viewport.world_to_screen(vec2(node.x, node.y));
            scratch.screen_positions.push(rect.min + screen.to_vec2());
            scratch
                .screen_radii
                .push(screen_radius(node.radius, viewport.zoom));
        }
    }

    fn hovered_id(&self, ui: &Ui, rect: Rect) -> Option<String> {
        let pointer = ui.input(|input| input.pointer.hover_pos())?;
        if !rect.contains(pointer) {
            return None;
        }

        let scratch = &self.view_scratch;
        let nodes = self.graph.engine().nodes();
        scratch
            .screen_positions
            .iter()
            .zip(&scratch.screen_radii)
            .enumerate()
            .filter(|(index, (position, radius))| {
                *index < nodes.len() && position.distance(pointer) <= **radius
            })
            .min_by(|a, b| {
                let (_, (a_pos, _)) = a;
                let (_, (b_pos, _)) = b;
                a_pos.distance(pointer).total_cmp(&b_pos.distance(pointer))
            })
            .map(|(index, _)| nodes[index].id.clone())
    }

    fn pointer_in_panel(ui: &Ui, rect: Rect) -> Option<Pos2> {
        ui.input(|input| input.pointer.interact_pos())
            .map(|pointer| (pointer - rect.min).to_pos2())
    }

    fn handle_pointer(&mut self, ui: &Ui, rect: Rect, response: &Response, hovered: Option<&str>) {
        if response.drag_started_by(PointerButton::Primary) {
            match hovered {
                Some(id) => {
                    self.dragging = Some(id.to_owned());
                    self.graph
                        .enqueue(Update::Input(InputEvent::DragStart { id: id.to_owned() }));
                }
                None => self.panning = true,
            }
        }

        if response.dragged_by(PointerButton::Primary)
            && let Some(id) = &self.dragging
            && let Some(pointer) = Self::pointer_in_panel(ui, rect)
        {
            let world = self.graph.controller().viewport().screen_to_world(pointer);
            self.graph.enqueue(Update::Input(InputEvent::DragMove {
                id: id.clone(),
                x: world.x,
                y: world.y,
            }));
        }

        let panning = (self.panning && response.dragged_by(PointerButton::Primary))
            || response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle);
        if panning {
            let delta = response.drag_delta();
            if delta != egui::Vec2::ZERO {
                self.graph.enqueue(Update::Input(InputEvent::Pan {
                    dx: delta.x,
                    dy: delta.y,
                }));
            }
        }

        if response.drag_stopped() {
            if let Some(id) = self.dragging.take() {
                self.graph.enqueue(Update::Input(InputEvent::DragEnd { id }));
            }
            self.panning = false;
        }

        if response.hovered() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON
                && let Some(anchor) = Self::pointer_in_panel(ui, rect)
            {
                let factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
                self.graph
                    .enqueue(Update::Input(InputEvent::ZoomAt { factor, anchor }));
            }
        }

        if response.double_clicked_by(PointerButton::Primary) {
            if let Some(id) = hovered {
                self.graph
                    .enqueue(Update::FocalSelected { id: id.to_owned() });
            }
        } else if response.clicked_by(PointerButton::Primary) {
            self.selected = hovered.map(str::to_owned);
        } else if response.clicked_by(PointerButton::Secondary)
            && let Some(id) = hovered
        {
            self.graph
                .enqueue(Update::Input(InputEvent::PinToggle { id: id.to_owned() }));
        }
    }

    fn draw_quadtree_overlay(&mut self, painter: &egui::Painter, rect: Rect) {
        let engine = self.graph.engine();
        let viewport = self.graph.controller().viewport();
        engine.quadtree_cells(&mut self.view_scratch.quadtree_cells);

        for cell in &self.view_scratch.quadtree_cells {
            let extent = vec2(cell.half_extent, cell.half_extent);
            let min = rect.min + viewport.world_to_screen(cell.center - extent).to_vec2();
            let max = rect.min + viewport.world_to_screen(cell.center + extent).to_vec2();
            let alpha = if cell.is_leaf { 110 } else { 55 };
            let line_width = (1.4 - (cell.depth as f32 * 0.09)).clamp(0.45, 1.4);
            painter.rect_stroke(
                Rect::from_min_max(min, max),
                0.0,
                Stroke::new(line_width, Color32::from_rgba_unmultiplied(106, 198, 255, alpha)),
                egui::StrokeKind::Middle,
            );
            if cell.is_leaf {
                let weight = rect.min + viewport.world_to_screen(cell.mass_center).to_vec2();
                painter.circle_filled(
                    weight,
                    (1.5 + cell.mass.sqrt()).min(6.0),
                    Color32::from_rgba_unmultiplied(106, 198, 255, 90),
                );
            }
        }
    }

    fn draw_edges(&self, painter: &egui::Painter, rect: Rect, snapshot: &Snapshot) {
        let positions = &self.view_scratch.screen_positions;
        let zoom_sqrt = snapshot.viewport.zoom.sqrt();
        let focal_index = snapshot
            .focal
            .as_deref()
            .and_then(|focal| snapshot.nodes.iter().position(|node| node.id == focal));

        for edge in &snapshot.edges {
            let (a, b) = edge.endpoints;
            let (Some(&start), Some(&end)) = (positions.get(a), positions.get(b)) else {
                continue;
            };
            if !edge_visible(rect, start, end) {
                continue;
            }

            let touches_focal = focal_index.is_some_and(|focal| focal == a || focal == b);
            let touches_selected = self
                .selected
                .as_deref()
                .is_some_and(|id| snapshot.nodes[a].id == id || snapshot.nodes[b].id == id);
            let (width, color) = if touches_selected {
                ((2.2 * zoom_sqrt).clamp(1.2, 4.0), SELECTED_RING)
            } else if touches_focal {
                (
                    (1.5 * zoom_sqrt).clamp(0.8, 3.4),
                    Color32::from_rgba_unmultiplied(160, 150, 110, 200),
                )
            } else {
                (
                    (1.1 * zoom_sqrt).clamp(0.6, 3.0),
                    Color32::from_rgba_unmultiplied(90, 96, 108, 190),
                )
            };
            painter.line_segment([start, end], Stroke::new(width, color));
        }
    }

    fn draw_nodes(
        &self,
        painter: &egui::Painter,
        rect: Rect,
        snapshot: &Snapshot,
        hovered: Option<&str>,
    ) {
        let scratch = &self.view_scratch;
        let max_hops = self.graph.controller().max_hops();

        for (index, node) in snapshot.nodes.iter().enumerate() {
            let position = scratch.screen_positions[index];
            let radius = scratch.screen_radii[index];
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let is_hovered = hovered == Some(node.id.as_str());
            let is_selected = self.selected.as_deref() == Some(node.id.as_str());
            let fill = if is_hovered {
                Color32::from_rgb(255, 164, 101)
            } else {
                hop_color(node.hop_distance, max_hops, node.missing)
            };

            painter.circle_filled(position, radius, fill);
            let outline = if is_selected {
                Stroke::new(2.2, SELECTED_RING)
            } else if node.pinned {
                Stroke::new(1.8, PINNED_RING)
            } else {
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
            };
            painter.circle_stroke(position, radius, outline);

            let should_draw_label = self.show_all_labels
                || is_hovered
                || is_selected
                || node.hop_distance == 0
                || snapshot.viewport.zoom > 1.2;
            if should_draw_label {
                let color = if node.missing {
                    Color32::from_gray(150)
                } else {
                    Color32::from_gray(238)
                };
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    &node.title,
                    FontId::proportional(12.0),
                    color,
                );
            }
        }
    }
}
