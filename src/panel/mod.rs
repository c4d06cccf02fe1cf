use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use eframe::egui::{self, Context, Pos2};
use log::{info, warn};

use local_graph::layout::QuadtreeCell;
use local_graph::{DocumentSource, LocalGraph, LocalGraphConfig, PanelLifecycle, Update};

use crate::vault::{Vault, load_vault};

mod controls;
mod render_utils;
mod view;

pub struct LocalGraphApp {
    vault_path: PathBuf,
    config: LocalGraphConfig,
    focal: Option<String>,
    state: PanelState,
    reload_rx: Option<Receiver<Result<Vault, String>>>,
}

enum PanelState {
    Loading {
        rx: Receiver<Result<Vault, String>>,
    },
    Ready(Box<PanelModel>),
    Error(String),
}

struct PanelModel {
    vault: Vault,
    graph: LocalGraph,
    mounted: bool,
    search: String,
    selected: Option<String>,
    dragging: Option<String>,
    panning: bool,
    live_physics: bool,
    show_quadtree_overlay: bool,
    show_all_labels: bool,
    view_scratch: ViewScratch,
}

#[derive(Default)]
struct ViewScratch {
    screen_positions: Vec<Pos2>,
    screen_radii: Vec<f32>,
    quadtree_cells: Vec<QuadtreeCell>,
}

impl PanelLifecycle for PanelModel {
    fn on_mount(&mut self, source: &dyn DocumentSource) {
        self.graph.load_from(source);
        self.mounted = true;
    }

    fn on_unmount(&mut self) {
        if self.mounted {
            info!(
                "unmounting panel after {} layout ticks",
                self.graph.engine().ticks()
            );
        }
        self.mounted = false;
        self.dragging = None;
    }
}

impl PanelModel {
    fn new(vault: Vault, config: LocalGraphConfig) -> Self {
        let mut model = Self {
            vault: Vault::default(),
            graph: LocalGraph::new(config),
            mounted: false,
            search: String::new(),
            selected: None,
            dragging: None,
            panning: false,
            live_physics: true,
            show_quadtree_overlay: false,
            show_all_labels: false,
            view_scratch: ViewScratch::default(),
        };
        model.on_mount(&vault);
        model.vault = vault;
        model
    }

    /// Feeds the difference between the current and the reloaded vault into
    /// the session, keeping layout state for everything that persisted.
    fn apply_reload(&mut self, vault: Vault) {
        let updates = vault.diff(&self.vault);
        info!("reload produced {} document updates", updates.len());
        let focal_deleted = self.graph.focal().is_some_and(|focal| {
            updates
                .iter()
                .any(|update| matches!(update, Update::DocumentDeleted { id } if id == focal))
        });
        for update in updates {
            self.graph.enqueue(update);
        }
        if focal_deleted && let Some(id) = vault.active_document() {
            self.graph.enqueue(Update::FocalSelected { id });
        }
        self.vault = vault;
    }
}

impl LocalGraphApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        vault_path: PathBuf,
        config: LocalGraphConfig,
        focal: Option<String>,
    ) -> Self {
        let state = Self::start_load(vault_path.clone(), focal.clone());
        Self {
            vault_path,
            config,
            focal,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(vault_path: PathBuf, focal: Option<String>) -> Receiver<Result<Vault, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_vault(&vault_path)
                .map(|mut vault| {
                    vault.set_active(focal);
                    vault
                })
                .map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(vault_path: PathBuf, focal: Option<String>) -> PanelState {
        PanelState::Loading {
            rx: Self::spawn_load(vault_path, focal),
        }
    }
}

impl eframe::App for LocalGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            PanelState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(vault) => {
                            PanelState::Ready(Box::new(PanelModel::new(vault, self.config.clone())))
                        }
                        Err(error) => PanelState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading vault...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            PanelState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load vault");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(
                            self.vault_path.clone(),
                            self.focal.clone(),
                        ));
                    }
                });
            }
            PanelState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.vault_path.clone(), None));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(vault)) => model.apply_reload(vault),
                        Ok(Err(error)) => {
                            warn!("reload failed: {error}");
                            model.on_unmount();
                            transition = Some(PanelState::Error(error));
                        }
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                        }
                        Err(TryRecvError::Disconnected) => {
                            model.on_unmount();
                            transition = Some(PanelState::Error(
                                "Background load worker disconnected".to_owned(),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let PanelState::Ready(model) = &mut self.state {
            model.on_unmount();
        }
    }
}
