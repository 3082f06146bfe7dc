use clap::Parser;
use eframe::egui;
use indextree::NodeId;
use spacefiler::config::Settings;
use spacefiler::crawler::{ScanPhase, ScanProgress, ScanStats};
use spacefiler::format::{describe, format_size, tile_rgb};
use spacefiler::logging::{self, Output};
use spacefiler::{Error, FileOpController, LocalFs, NodeKind, Rect, Selection, Session, Snapshot};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "spacefiler", about = "Treemap file manager")]
struct Cli {
    /// Directory to scan on startup
    path: Option<PathBuf>,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(&settings.log, Output::Stderr)?;

    let fs = LocalFs::new(settings.exclude.clone(), settings.scan_threads);
    let auto_scan = cli.path.is_some() || settings.root.is_some();
    let start = settings.scan_root(cli.path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("SpaceFiler"),
        ..Default::default()
    };

    eframe::run_native(
        "SpaceFiler",
        options,
        Box::new(move |cc| {
            configure_custom_style(&cc.egui_ctx);
            let mut app = SpaceFilerApp::new(fs, start.display().to_string());
            if auto_scan {
                app.start_scan();
            }
            Box::new(app)
        }),
    )?;
    Ok(())
}

fn configure_custom_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = egui::Color32::from_rgb(24, 26, 30);
    visuals.window_stroke = egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 26));
    style.visuals = visuals;
    style.spacing.item_spacing = egui::vec2(10.0, 6.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);
    ctx.set_style(style);
}

struct ScanResult {
    root: PathBuf,
    snapshot: Snapshot,
    stats: ScanStats,
}

type Shared<T> = Arc<Mutex<Option<T>>>;

fn take<T>(shared: &Shared<T>) -> Option<T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner).take()
}

fn peek<T: Clone>(shared: &Shared<T>) -> Option<T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

struct SpaceFilerApp {
    ops: FileOpController<LocalFs>,
    scan_path: String,
    is_scanning: bool,
    scan_result: Shared<Result<ScanResult, String>>,
    scan_progress: Shared<ScanProgress>,

    session: Option<Session>,
    marked: Option<PathBuf>,
    confirm_delete: Option<NodeId>,
    status: String,
}

impl SpaceFilerApp {
    fn new(fs: LocalFs, scan_path: String) -> Self {
        Self {
            ops: FileOpController::new(fs),
            scan_path,
            is_scanning: false,
            scan_result: Arc::new(Mutex::new(None)),
            scan_progress: Arc::new(Mutex::new(None)),
            session: None,
            marked: None,
            confirm_delete: None,
            status: String::new(),
        }
    }

    fn start_scan(&mut self) {
        if self.is_scanning {
            return;
        }

        let path = if self.scan_path.trim().is_empty() {
            ".".to_string()
        } else {
            self.scan_path.trim().to_string()
        };
        let root = match Path::new(&path).canonicalize() {
            Ok(root) if root.is_dir() => root,
            Ok(root) => {
                self.status = format!("Not a directory: {}", root.display());
                return;
            }
            Err(err) => {
                self.status = format!("Cannot open {}: {}", path, err);
                return;
            }
        };

        self.is_scanning = true;
        self.status = format!("Scanning {} ...", root.display());
        let scan_result = self.scan_result.clone();
        let scan_progress = self.scan_progress.clone();
        let fs = self.ops.filesystem().clone();

        thread::spawn(move || {
            let reporter = Arc::new(move |progress: ScanProgress| {
                *scan_progress.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress);
            });
            let result = fs
                .scan_with_progress(&root, Some(reporter))
                .map(|(snapshot, stats)| ScanResult { root, snapshot, stats })
                .map_err(|e| e.to_string());
            *scan_result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        });
    }

    fn poll_scan(&mut self) {
        let Some(result) = take(&self.scan_result) else {
            return;
        };
        self.is_scanning = false;
        take(&self.scan_progress);

        match result {
            Ok(result) => {
                self.status = format!(
                    "Scanned {} files, {} dirs, {} in {} ms",
                    result.stats.total_files,
                    result.stats.total_dirs,
                    format_size(result.stats.total_size),
                    result.stats.duration_ms,
                );
                self.scan_path = result.root.display().to_string();
                self.session = Some(Session::from_snapshot(&result.root, result.snapshot));
                self.marked = None;
                self.confirm_delete = None;
            }
            Err(err) => self.status = format!("Scan failed: {}", err),
        }
    }

    fn report(&mut self, action: &str, result: Result<String, Error>) {
        self.status = match result {
            Ok(message) => message,
            Err(err) if err.is_partial() => format!("{} partially failed: {} (view re-synced)", action, err),
            Err(err) => format!("{} failed: {}", action, err),
        };
    }

    fn breadcrumb_bar(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let crumbs = session.breadcrumb();
        let last = crumbs.len().saturating_sub(1);
        let mut target = None;

        ui.horizontal(|ui| {
            for (depth, name) in crumbs.iter().enumerate() {
                if depth > 0 {
                    ui.label("›");
                }
                if ui.add_enabled(depth < last, egui::Button::new(name.as_str())).clicked() {
                    target = Some(depth);
                }
            }
            ui.separator();
            ui.label(describe(session.tree(), session.focused()));
        });

        if let Some(depth) = target {
            if let Err(err) = session.ascend_to(depth) {
                self.status = err.to_string();
            }
        }
    }

    fn action_bar(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let selected = session.selected();
        let focused = session.focused();
        let has_clip = !session.clipboard().is_empty();

        let mut action: Option<&str> = None;
        ui.horizontal(|ui| {
            for (label, enabled) in [
                ("Duplicate", selected.is_some()),
                ("Delete", selected.is_some()),
                ("Copy", selected.is_some()),
                ("Cut", selected.is_some()),
                ("Paste", has_clip),
                ("Mark", selected.is_some()),
                ("Move here", self.marked.is_some()),
                ("Rescan", true),
            ] {
                if ui.add_enabled(enabled, egui::Button::new(label)).clicked() {
                    action = Some(label);
                }
            }

            if let Some(id) = selected {
                ui.separator();
                let tree = session.tree();
                ui.label(format!("{} {}", tree.path_of(id).display(), describe(tree, id)));
            }
            if let Some(entry) = session.clipboard().peek() {
                ui.separator();
                ui.label(format!("Clipboard: {:?} {}", entry.mode, entry.path.display()));
            }
        });

        if self.confirm_delete.is_some() {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::from_rgb(239, 68, 68), "Delete the selection permanently?");
                if ui.button("Confirm").clicked() {
                    action = Some("Confirm delete");
                }
                if ui.button("Cancel").clicked() {
                    action = Some("Cancel delete");
                }
            });
        }

        let Some(action) = action else {
            return;
        };
        let name_of = |session: &Session, id: NodeId| session.tree().get(id).map(|n| n.name.clone()).unwrap_or_default();

        match (action, selected) {
            ("Duplicate", Some(node)) => {
                let result = self.ops.duplicate(session, node).map(|id| format!("Created {}", name_of(session, id)));
                self.report("Duplicate", result);
            }
            ("Delete", Some(node)) => self.confirm_delete = Some(node),
            ("Confirm delete", _) => {
                if let Some(node) = self.confirm_delete.take() {
                    let name = name_of(session, node);
                    let result = self.ops.delete(session, node).map(|_| format!("Deleted {}", name));
                    self.report("Delete", result);
                }
            }
            ("Cancel delete", _) => self.confirm_delete = None,
            ("Copy", Some(node)) => {
                let result = self.ops.copy(session, node).map(|e| format!("Copied {}", e.path.display()));
                self.report("Copy", result);
            }
            ("Cut", Some(node)) => {
                let result = self.ops.cut(session, node).map(|e| format!("Cut {}", e.path.display()));
                self.report("Cut", result);
            }
            ("Paste", _) => {
                let result = self.ops.paste(session, focused).map(|id| format!("Pasted {}", name_of(session, id)));
                self.report("Paste", result);
            }
            ("Mark", Some(node)) => {
                let path = session.tree().path_of(node);
                self.status = format!("Marked {}", path.display());
                self.marked = Some(path);
            }
            ("Move here", _) => {
                let Some(marked) = self.marked.take() else {
                    return;
                };
                let result = match session.tree().get_node(&marked) {
                    Some(node) => self
                        .ops
                        .move_node(session, node, focused)
                        .map(|id| format!("Moved to {}", session.tree().path_of(id).display())),
                    None => Err(Error::NotFound(marked.display().to_string())),
                };
                self.report("Move", result);
            }
            ("Rescan", _) => {
                let result = self.ops.rescan(session).map(|_| "Rescanned".to_string());
                self.report("Rescan", result);
            }
            _ => {}
        }
    }

    fn treemap(&mut self, ui: &mut egui::Ui) {
        let canvas = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(canvas, egui::Sense::click());
        let painter = ui.painter_at(canvas);
        painter.rect_filled(canvas, 0.0, egui::Color32::from_rgb(18, 18, 20));

        let Some(session) = self.session.as_mut() else {
            let text = if self.is_scanning { "Scanning..." } else { "Enter a path and press Scan" };
            painter.text(
                canvas.center(),
                egui::Align2::CENTER_CENTER,
                text,
                egui::FontId::proportional(16.0),
                egui::Color32::GRAY,
            );
            return;
        };

        // Layout coordinates are relative to the canvas origin
        let bounds = Rect::new(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
        let to_local = |pos: egui::Pos2| ((pos.x - canvas.min.x) as f64, (pos.y - canvas.min.y) as f64);

        let layout = session.layout(bounds);
        let hovered = response.hover_pos().map(to_local).and_then(|(x, y)| {
            layout.iter().find(|e| e.rect.contains(x, y)).map(|e| e.node)
        });
        let depth = session.navigation().depth() + 1;
        let selected = session.selected();
        let tree = session.tree();

        for entry in &layout {
            let Some(node) = tree.get(entry.node) else {
                continue;
            };
            let r = entry.rect;
            let tile = egui::Rect::from_min_size(
                egui::pos2(canvas.min.x + r.x as f32, canvas.min.y + r.y as f32),
                egui::vec2(r.width as f32, r.height as f32),
            );
            let (red, green, blue) = tile_rgb(node.kind, depth, &node.name);
            let mut fill = egui::Color32::from_rgb(red, green, blue);
            if hovered == Some(entry.node) {
                fill = fill.gamma_multiply(1.15);
            }
            painter.rect_filled(tile.shrink(1.0), 2.0, fill);

            let stroke = if selected == Some(entry.node) {
                egui::Stroke::new(2.0, egui::Color32::from_rgb(246, 211, 101))
            } else {
                egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(255, 255, 255, 30))
            };
            painter.rect_stroke(tile.shrink(1.0), 2.0, stroke);

            if r.width * r.height > 2500.0 {
                let icon = if node.kind == NodeKind::Directory { "📁" } else { "📄" };
                painter.text(
                    egui::pos2(tile.center().x, tile.center().y - 8.0),
                    egui::Align2::CENTER_CENTER,
                    format!("{} {}", icon, node.name),
                    egui::FontId::proportional(13.0),
                    egui::Color32::WHITE,
                );
                painter.text(
                    egui::pos2(tile.center().x, tile.center().y + 8.0),
                    egui::Align2::CENTER_CENTER,
                    format_size(node.size),
                    egui::FontId::proportional(10.0),
                    egui::Color32::from_rgba_unmultiplied(255, 255, 255, 153),
                );
            }
        }

        if hovered.map(|id| tree.get(id).map(|n| n.is_dir()).unwrap_or(false)).unwrap_or(false) {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        if response.secondary_clicked() {
            session.ascend();
        } else if response.clicked() {
            if let Some(point) = response.interact_pointer_pos().map(to_local) {
                match session.click(point, bounds) {
                    Ok(Some(Selection::FileSelected(id))) => {
                        self.status = describe(session.tree(), id);
                    }
                    Ok(_) => {}
                    Err(err) => self.status = format!("Click failed: {}", err),
                }
            }
        }
    }
}

impl eframe::App for SpaceFilerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_scan();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("SpaceFiler");
                ui.separator();

                ui.label("Path:");
                let edit = ui.text_edit_singleline(&mut self.scan_path);
                if ui.button("Scan").clicked()
                    || (edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)))
                {
                    self.start_scan();
                }

                if self.is_scanning {
                    ui.spinner();
                    let text = match peek(&self.scan_progress) {
                        Some(p) if p.phase == ScanPhase::Processing => format!(
                            "Processing {:.0}%",
                            p.fraction().unwrap_or(0.0) * 100.0
                        ),
                        Some(p) => format!("Discovering... {} found", p.discovered_entries),
                        None => "Scanning...".to_string(),
                    };
                    ui.label(text);
                }
            });
            self.breadcrumb_bar(ui);
            self.action_bar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.label(self.status.as_str());
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.treemap(ui);
        });

        if self.is_scanning {
            ctx.request_repaint();
        }
    }
}
