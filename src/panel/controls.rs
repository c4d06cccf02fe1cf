use eframe::egui::{self, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use log::warn;

use local_graph::{Direction, InputEvent, RepulsionLaw, Update, title_from_id};

use super::PanelModel;

const MAX_SEARCH_RESULTS: usize = 12;
const MAX_HOPS_LIMIT: usize = 6;

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl PanelModel {
    pub(in crate::panel) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Local graph");
        ui.separator();
        ui.add_space(4.0);

        self.draw_focal_search(ui);
        ui.separator();
        self.draw_neighborhood_settings(ui);
        ui.separator();
        self.draw_selection(ui);
        ui.separator();

        ui.checkbox(&mut self.live_physics, "Live physics simulation")
            .on_hover_text("Advance the layout every frame. Input is still applied when paused.");
        ui.checkbox(&mut self.show_quadtree_overlay, "Show quadtree overlay")
            .on_hover_text("Draw the Barnes–Hut partition over the graph canvas.");
        ui.checkbox(&mut self.show_all_labels, "Show all labels");

        ui.collapsing("Physics tuning", |ui| self.draw_physics_tuning(ui));
        ui.collapsing("Simulation state", |ui| {
            let engine = self.graph.engine();
            ui.label(format!("ticks: {}", engine.ticks()));
            ui.label(format!("energy: {:.4}", engine.energy()));
            ui.label(format!("alpha: {:.3}", engine.alpha()));
            ui.label(format!("converged: {}", engine.is_converged()));
            ui.label(format!("extractions: {}", self.graph.extractions()));
        });
    }

    fn draw_focal_search(&mut self, ui: &mut Ui) {
        ui.label(format!(
            "Focal: {}",
            self.graph.focal().map(title_from_id).unwrap_or("none")
        ));
        ui.label("Search documents")
            .on_hover_text("Fuzzy-match document ids, then click one to focus it.");
        ui.text_edit_singleline(&mut self.search);

        let query = self.search.trim();
        if query.is_empty() {
            return;
        }

        let matcher = SkimMatcherV2::default();
        let mut matches = self
            .vault
            .ids()
            .filter_map(|id| fuzzy_match_score(&matcher, id, query).map(|score| (score, id)))
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut picked = None;
        for (_, id) in matches.into_iter().take(MAX_SEARCH_RESULTS) {
            let is_focal = self.graph.focal() == Some(id);
            if ui
                .selectable_label(is_focal, title_from_id(id))
                .on_hover_text(id)
                .clicked()
            {
                picked = Some(id.to_owned());
            }
        }
        if let Some(id) = picked {
            self.graph.enqueue(Update::FocalSelected { id });
            self.search.clear();
        }
    }

    fn draw_neighborhood_settings(&mut self, ui: &mut Ui) {
        let controller = self.graph.controller();
        let mut max_hops = controller.max_hops();
        let mut direction = controller.direction();

        let hops_changed = ui
            .add(egui::Slider::new(&mut max_hops, 1..=MAX_HOPS_LIMIT).text("Max hops"))
            .on_hover_text("How many link hops away from the focal document to include.")
            .changed();
        if hops_changed {
            self.graph
                .enqueue(Update::Input(InputEvent::SetMaxHops(max_hops)));
        }

        let mut direction_changed = false;
        egui::ComboBox::from_label("Links")
            .selected_text(direction.label())
            .show_ui(ui, |ui| {
                for option in Direction::ALL {
                    direction_changed |= ui
                        .selectable_value(&mut direction, option, option.label())
                        .changed();
                }
            });
        if direction_changed {
            self.graph
                .enqueue(Update::Input(InputEvent::SetDirection(direction)));
        }
    }

    fn draw_selection(&mut self, ui: &mut Ui) {
        let Some(selected) = self.selected.clone() else {
            ui.label("Click a node to select it. Right-click toggles its pin.");
            return;
        };
        let Some(node) = self.graph.engine().node(&selected) else {
            self.selected = None;
            return;
        };

        ui.strong(node.title.as_str());
        ui.label(format!("hop distance: {}", node.hop));
        ui.label(format!("degree: {}", node.degree));
        if node.missing {
            ui.label("not written yet");
        }

        let pinned = self.graph.controller().is_pin_persistent(&selected);
        let mut updates = Vec::new();
        ui.horizontal(|ui| {
            let pin_label = if pinned { "Unpin" } else { "Pin" };
            if ui.button(pin_label).clicked() {
                updates.push(Update::Input(InputEvent::PinToggle {
                    id: selected.clone(),
                }));
            }
            if ui.button("Focus").clicked() {
                updates.push(Update::FocalSelected {
                    id: selected.clone(),
                });
            }
        });
        for update in updates {
            self.graph.enqueue(update);
        }
    }

    fn draw_physics_tuning(&mut self, ui: &mut Ui) {
        let mut config = self.graph.config().clone();
        let mut changed = false;

        changed |= ui
            .add(
                egui::Slider::new(&mut config.repulsion_strength, 200.0..=20_000.0)
                    .logarithmic(true)
                    .text("Repulsion"),
            )
            .on_hover_text("How strongly nodes push away from each other.")
            .changed();
        ui.horizontal(|ui| {
            changed |= ui
                .selectable_value(
                    &mut config.repulsion_law,
                    RepulsionLaw::InverseSquare,
                    "1/d²",
                )
                .changed();
            changed |= ui
                .selectable_value(&mut config.repulsion_law, RepulsionLaw::InverseLinear, "1/d")
                .changed();
        });
        changed |= ui
            .add(egui::Slider::new(&mut config.spring_stiffness, 0.005..=0.4).text("Edge spring"))
            .on_hover_text("How strongly linked documents pull together.")
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.spring_length, 20.0..=300.0).text("Link length"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.centering_strength, 0.0..=0.05).text("Centering"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.focal_strength, 0.0..=0.2).text("Focal pull"))
            .changed();
        changed |= ui
            .add(egui::Slider::new(&mut config.damping, 0.5..=0.98).text("Velocity damping"))
            .on_hover_text("Fraction of velocity kept each tick.")
            .changed();

        if changed && let Err(error) = self.graph.set_config(config) {
            warn!("rejected physics settings: {error}");
        }
    }
}
