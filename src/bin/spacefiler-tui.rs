use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use indextree::NodeId;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use spacefiler::config::Settings;
use spacefiler::crawler::{ScanPhase, ScanProgress, ScanStats};
use spacefiler::format::{describe, format_size, tile_rgb};
use spacefiler::logging::{self, Output};
use spacefiler::watch::FsWatcher;
use spacefiler::{Error, FileOpController, LocalFs, NodeKind, Rect, Selection, Session, Snapshot};
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "spacefiler-tui", about = "Terminal treemap file manager")]
struct Cli {
    /// Directory to scan on startup
    path: Option<PathBuf>,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,
}

enum ScanEvent {
    Progress(ScanProgress),
    Completed(Result<ScanResult, String>),
}

struct ScanResult {
    root: PathBuf,
    snapshot: Snapshot,
    stats: ScanStats,
}

#[derive(Clone)]
struct HitTile {
    node: NodeId,
    x0: u16,
    y0: u16,
    x1: u16,
    y1: u16,
}

struct VisibleTile {
    node: NodeId,
    name: String,
    size: u64,
    kind: NodeKind,
    x0: u16,
    y0: u16,
    x1: u16,
    y1: u16,
}

#[derive(Default, Clone, Copy)]
struct UiLayoutState {
    path_input_area: Option<UiRect>,
    breadcrumb_area: Option<UiRect>,
    treemap_inner_area: Option<UiRect>,
}

struct App {
    ops: FileOpController<LocalFs>,

    path_input: String,
    input_mode: bool,
    status: String,
    is_scanning: bool,
    scan_progress: Option<ScanProgress>,
    scan_rx: Option<Receiver<ScanEvent>>,
    last_scan_finished_at: Option<Instant>,

    session: Option<Session>,
    watcher: Option<FsWatcher>,
    marked: Option<PathBuf>,
    confirm_delete: bool,

    hit_tiles: Vec<HitTile>,
    ui_layout: UiLayoutState,

    should_quit: bool,
}

impl App {
    fn new(fs: LocalFs, path_input: String) -> Self {
        Self {
            ops: FileOpController::new(fs),
            path_input,
            input_mode: true,
            status: String::from("Type path and press Enter to scan"),
            is_scanning: false,
            scan_progress: None,
            scan_rx: None,
            last_scan_finished_at: None,
            session: None,
            watcher: None,
            marked: None,
            confirm_delete: false,
            hit_tiles: Vec::new(),
            ui_layout: UiLayoutState::default(),
            should_quit: false,
        }
    }

    fn start_scan(&mut self) {
        if self.is_scanning {
            return;
        }

        let path = if self.path_input.trim().is_empty() {
            ".".to_string()
        } else {
            self.path_input.trim().to_string()
        };

        // Watcher events carry absolute paths
        let root = match Path::new(&path).canonicalize() {
            Ok(root) => root,
            Err(err) => {
                self.status = format!("Cannot open {}: {}", path, err);
                return;
            }
        };
        if !root.is_dir() {
            self.status = format!("Not a directory: {}", root.display());
            return;
        }

        self.path_input = root.display().to_string();
        self.status = format!("Scanning {} ...", root.display());
        self.is_scanning = true;
        self.scan_progress = Some(ScanProgress::starting());

        let (tx, rx) = mpsc::channel::<ScanEvent>();
        self.scan_rx = Some(rx);
        let fs = self.ops.filesystem().clone();

        thread::spawn(move || {
            let progress_tx = tx.clone();
            let reporter = Arc::new(move |progress: ScanProgress| {
                let _ = progress_tx.send(ScanEvent::Progress(progress));
            });

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                fs.scan_with_progress(&root, Some(reporter))
            }));

            let event = match result {
                Ok(Ok((snapshot, stats))) => ScanEvent::Completed(Ok(ScanResult { root, snapshot, stats })),
                Ok(Err(err)) => ScanEvent::Completed(Err(err.to_string())),
                Err(_) => ScanEvent::Completed(Err("Scan thread panicked".to_string())),
            };

            let _ = tx.send(event);
        });
    }

    fn poll_scan_updates(&mut self) {
        let mut done: Option<Result<ScanResult, String>> = None;
        let mut disconnected = false;

        if let Some(rx) = self.scan_rx.as_ref() {
            loop {
                match rx.try_recv() {
                    Ok(ScanEvent::Progress(progress)) => {
                        self.scan_progress = Some(progress);
                    }
                    Ok(ScanEvent::Completed(result)) => {
                        done = Some(result);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }

        if disconnected {
            self.scan_rx = None;
            self.is_scanning = false;
            if done.is_none() {
                self.status = "Scan channel disconnected".to_string();
            }
        }

        if let Some(result) = done {
            self.scan_rx = None;
            self.is_scanning = false;
            self.scan_progress = None;

            match result {
                Ok(scan_result) => {
                    self.watcher = match FsWatcher::new(&scan_result.root) {
                        Ok(watcher) => Some(watcher),
                        Err(err) => {
                            tracing::warn!(error = %err, "cannot watch scan root");
                            None
                        }
                    };
                    self.session = Some(Session::from_snapshot(&scan_result.root, scan_result.snapshot));
                    self.marked = None;
                    self.confirm_delete = false;
                    self.last_scan_finished_at = Some(Instant::now());
                    self.status = format!(
                        "Scan complete: {} files, {} dirs, {} total",
                        scan_result.stats.total_files,
                        scan_result.stats.total_dirs,
                        format_size(scan_result.stats.total_size),
                    );
                }
                Err(err) => {
                    self.status = format!("Scan failed: {}", err);
                }
            }
        }
    }

    fn poll_watcher(&mut self) {
        let (Some(watcher), Some(session)) = (self.watcher.as_ref(), self.session.as_mut()) else {
            return;
        };
        let changed = watcher.drain();
        if changed.is_empty() {
            return;
        }
        if let Err(err) = self.ops.sync_paths(session, &changed) {
            self.status = format!("Refresh failed: {}", err);
        }
    }

    fn report(&mut self, action: &str, result: Result<String, Error>) {
        self.status = match result {
            Ok(message) => message,
            Err(err) if err.is_partial() => format!("{} partially failed: {} (view re-synced)", action, err),
            Err(err) => format!("{} failed: {}", action, err),
        };
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        if self.input_mode {
            match key.code {
                KeyCode::Enter => {
                    self.input_mode = false;
                    self.start_scan();
                }
                KeyCode::Esc => {
                    self.input_mode = false;
                }
                KeyCode::Backspace => {
                    self.path_input.pop();
                }
                KeyCode::Char(ch) => {
                    self.path_input.push(ch);
                }
                _ => {}
            }
            return;
        }

        let confirming = std::mem::take(&mut self.confirm_delete);

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.input_mode = true,
            KeyCode::Char('s') => self.start_scan(),
            KeyCode::Char('r') => self.rescan(),
            KeyCode::Char('u') | KeyCode::Backspace => self.ascend(),
            KeyCode::Char(ch @ '0'..='9') => self.ascend_to(ch as usize - '0' as usize),
            KeyCode::Char('d') => self.duplicate_selected(),
            KeyCode::Char('y') => self.clip_selected(false),
            KeyCode::Char('x') => self.clip_selected(true),
            KeyCode::Char('p') => self.paste_here(),
            KeyCode::Char('m') => self.mark_selected(),
            KeyCode::Char('M') => self.move_marked_here(),
            KeyCode::Delete | KeyCode::Char('D') => self.delete_selected(confirming),
            KeyCode::Esc => {
                if let Some(session) = self.session.as_mut() {
                    session.select(None);
                }
            }
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        if let MouseEventKind::Down(MouseButton::Left) = event.kind {
            if let Some(path_input_area) = self.ui_layout.path_input_area {
                if point_in_rect(path_input_area, event.column, event.row) {
                    self.input_mode = true;
                    return;
                }
            }

            if let Some(area) = self.ui_layout.breadcrumb_area {
                if point_in_rect(area, event.column, event.row) {
                    if let Some(depth) = self.breadcrumb_depth_at(area, event.column) {
                        self.ascend_to(depth);
                    }
                    return;
                }
            }

            self.click_treemap(event.column, event.row);
            return;
        }

        if let MouseEventKind::Down(MouseButton::Right) = event.kind {
            self.ascend();
        }
    }

    fn click_treemap(&mut self, column: u16, row: u16) {
        let Some(area) = self.ui_layout.treemap_inner_area else {
            return;
        };
        if !point_in_rect(area, column, row) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Cell centres, in the same space the layout was computed in
        let point = ((column - area.x) as f64 + 0.5, (row - area.y) as f64 + 0.5);
        let result = session.click(point, treemap_bounds(area));
        self.status = match result {
            Ok(Some(Selection::Descended(_))) => format!("Opened {}", session.breadcrumb().join("/")),
            Ok(Some(Selection::FileSelected(id))) => {
                let name = session.tree().get(id).map(|n| n.name.clone()).unwrap_or_default();
                format!("{} {}", name, describe(session.tree(), id))
            }
            Ok(None) => return,
            Err(err) => format!("Click failed: {}", err),
        };
    }

    fn breadcrumb_depth_at(&self, area: UiRect, column: u16) -> Option<usize> {
        let session = self.session.as_ref()?;
        let mut x = area.x;
        for (depth, name) in session.breadcrumb().iter().enumerate() {
            let width = name.chars().count() as u16 + 3;
            if column >= x && column < x.saturating_add(width) {
                return Some(depth);
            }
            x = x.saturating_add(width);
        }
        None
    }

    fn ascend(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.ascend();
        }
    }

    fn ascend_to(&mut self, depth: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(err) = session.ascend_to(depth) {
            self.status = err.to_string();
        }
    }

    fn rescan(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.start_scan();
            return;
        };
        let result = self.ops.rescan(session).map(|_| format!("Rescanned, {} total", format_size(session.tree().total_size())));
        self.report("Rescan", result);
    }

    fn duplicate_selected(&mut self) {
        let Some((session, node)) = selected(&mut self.session) else {
            self.status = "Select a file first".to_string();
            return;
        };
        let result = self.ops.duplicate(session, node).map(|id| {
            let name = session.tree().get(id).map(|n| n.name.clone()).unwrap_or_default();
            format!("Created {}", name)
        });
        self.report("Duplicate", result);
    }

    fn clip_selected(&mut self, cut: bool) {
        let Some((session, node)) = selected(&mut self.session) else {
            self.status = "Select a file first".to_string();
            return;
        };
        let result = if cut {
            self.ops.cut(session, node)
        } else {
            self.ops.copy(session, node)
        };
        let result = result.map(|entry| format!("{:?}: {}", entry.mode, entry.path.display()));
        self.report("Clipboard", result);
    }

    fn paste_here(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let focused = session.focused();
        let result = self.ops.paste(session, focused).map(|id| {
            let name = session.tree().get(id).map(|n| n.name.clone()).unwrap_or_default();
            format!("Pasted {}", name)
        });
        self.report("Paste", result);
    }

    fn mark_selected(&mut self) {
        let Some((session, node)) = selected(&mut self.session) else {
            self.status = "Select a file first".to_string();
            return;
        };
        let path = session.tree().path_of(node);
        self.status = format!("Marked {} (M moves it here)", path.display());
        self.marked = Some(path);
    }

    fn move_marked_here(&mut self) {
        let (Some(session), Some(marked)) = (self.session.as_mut(), self.marked.clone()) else {
            self.status = "Nothing marked".to_string();
            return;
        };
        let Some(node) = session.tree().get_node(&marked) else {
            self.marked = None;
            self.status = format!("{} no longer exists", marked.display());
            return;
        };
        let focused = session.focused();
        let result = self.ops.move_node(session, node, focused).map(|id| {
            let path = session.tree().path_of(id);
            format!("Moved to {}", path.display())
        });
        if result.is_ok() {
            self.marked = None;
        }
        self.report("Move", result);
    }

    fn delete_selected(&mut self, confirmed: bool) {
        let Some((session, node)) = selected(&mut self.session) else {
            self.status = "Select a file first".to_string();
            return;
        };
        let name = session.tree().get(node).map(|n| n.name.clone()).unwrap_or_default();
        if !confirmed {
            self.confirm_delete = true;
            self.status = format!("Delete {}? Press Delete again to confirm", name);
            return;
        }
        let result = self.ops.delete(session, node).map(|_| format!("Deleted {}", name));
        self.report("Delete", result);
    }

    fn build_visible_tiles(&mut self, area: UiRect) -> Vec<VisibleTile> {
        self.hit_tiles.clear();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let layout = session.layout(treemap_bounds(area));
        let tree = session.tree();
        let mut tiles = Vec::with_capacity(layout.len());
        for entry in layout {
            let Some(node) = tree.get(entry.node) else {
                continue;
            };
            let Some((x0, y0, x1, y1)) = tile_bounds_in_area(entry.rect, area) else {
                continue;
            };
            self.hit_tiles.push(HitTile {
                node: entry.node,
                x0,
                y0,
                x1,
                y1,
            });
            tiles.push(VisibleTile {
                node: entry.node,
                name: node.name.clone(),
                size: node.size,
                kind: node.kind,
                x0,
                y0,
                x1,
                y1,
            });
        }
        tiles
    }

    fn hovered_tile(&self, x: u16, y: u16) -> Option<&HitTile> {
        self.hit_tiles.iter().find(|tile| tile.contains(x, y))
    }
}

impl HitTile {
    fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

fn selected(session: &mut Option<Session>) -> Option<(&mut Session, NodeId)> {
    let session = session.as_mut()?;
    let node = session.selected()?;
    Some((session, node))
}

fn treemap_bounds(area: UiRect) -> Rect {
    Rect::new(0.0, 0.0, area.width as f64, area.height as f64)
}

/// Cells whose centre falls inside `rect`, so that drawing agrees with
/// the click mapping.
fn tile_bounds_in_area(rect: Rect, area: UiRect) -> Option<(u16, u16, u16, u16)> {
    let first = |edge: f64| (edge - 0.5).ceil().max(0.0) as u16;
    let (cx0, cy0) = (first(rect.x), first(rect.y));
    let (cx1, cy1) = (first(rect.right()), first(rect.bottom()));
    if cx1 <= cx0 || cy1 <= cy0 {
        return None;
    }
    let x0 = area.x.saturating_add(cx0);
    let y0 = area.y.saturating_add(cy0);
    let x1 = area.x.saturating_add(cx1 - 1).min(area.x + area.width.saturating_sub(1));
    let y1 = area.y.saturating_add(cy1 - 1).min(area.y + area.height.saturating_sub(1));
    Some((x0, y0, x1, y1))
}

fn point_in_rect(rect: UiRect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn progress_status(progress: &ScanProgress) -> String {
    match progress.phase {
        ScanPhase::Discovering => format!(
            "Discovering entries... {} found",
            progress.discovered_entries
        ),
        ScanPhase::Processing => {
            if let Some(frac) = progress.fraction() {
                format!(
                    "Processing {:.0}% | files: {} dirs: {} | {}",
                    frac * 100.0,
                    progress.total_files,
                    progress.total_dirs,
                    format_size(progress.total_size),
                )
            } else {
                format!(
                    "Processing... files: {} dirs: {} | {}",
                    progress.total_files,
                    progress.total_dirs,
                    format_size(progress.total_size),
                )
            }
        }
    }
}

fn tile_color(tile: &VisibleTile, depth: usize) -> Color {
    let (r, g, b) = tile_rgb(tile.kind, depth, &tile.name);
    Color::Rgb(r, g, b)
}

struct TreemapWidget<'a> {
    tiles: &'a [VisibleTile],
    selected: Option<NodeId>,
    hovered: Option<NodeId>,
    depth: usize,
}

impl Widget for TreemapWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        for y in area.y..area.y.saturating_add(area.height) {
            for x in area.x..area.x.saturating_add(area.width) {
                buf[(x, y)]
                    .set_char(' ')
                    .set_style(Style::default().bg(Color::Rgb(18, 18, 20)));
            }
        }

        for tile in self.tiles {
            let (x0, y0, x1, y1) = (tile.x0, tile.y0, tile.x1, tile.y1);
            let bg = tile_color(tile, self.depth + 1);
            let border_color = if self.selected == Some(tile.node) {
                Color::Rgb(246, 211, 101)
            } else if self.hovered == Some(tile.node) {
                Color::White
            } else {
                Color::Rgb(120, 120, 124)
            };

            for y in y0..=y1 {
                for x in x0..=x1 {
                    buf[(x, y)]
                        .set_char(' ')
                        .set_style(Style::default().bg(bg).fg(Color::White));
                }
            }

            if x1 > x0 && y1 > y0 {
                for x in x0..=x1 {
                    buf[(x, y0)].set_char('─').set_style(Style::default().fg(border_color).bg(bg));
                    buf[(x, y1)].set_char('─').set_style(Style::default().fg(border_color).bg(bg));
                }
                for y in y0..=y1 {
                    buf[(x0, y)].set_char('│').set_style(Style::default().fg(border_color).bg(bg));
                    buf[(x1, y)].set_char('│').set_style(Style::default().fg(border_color).bg(bg));
                }
                buf[(x0, y0)].set_char('┌').set_style(Style::default().fg(border_color).bg(bg));
                buf[(x1, y0)].set_char('┐').set_style(Style::default().fg(border_color).bg(bg));
                buf[(x0, y1)].set_char('└').set_style(Style::default().fg(border_color).bg(bg));
                buf[(x1, y1)].set_char('┘').set_style(Style::default().fg(border_color).bg(bg));
            }

            let label_width = x1.saturating_sub(x0).saturating_sub(1) as usize;
            if label_width >= 4 {
                let suffix = if tile.kind == NodeKind::Directory { "/" } else { "" };
                let mut label: String = format!("{}{} {}", tile.name, suffix, format_size(tile.size));
                if label.chars().count() > label_width {
                    label = label.chars().take(label_width.saturating_sub(1)).collect();
                    label.push('…');
                }

                for (i, ch) in label.chars().enumerate() {
                    let x = x0.saturating_add(1).saturating_add(i as u16);
                    if x > x1.saturating_sub(1) {
                        break;
                    }
                    buf[(x, y0)]
                        .set_char(ch)
                        .set_style(Style::default().fg(Color::White).bg(bg).add_modifier(Modifier::BOLD));
                }
            }
        }
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App, mouse: Option<(u16, u16)>) {
    let root = frame.area();
    let split = Layout::horizontal([Constraint::Length(42), Constraint::Min(30)]).split(root);
    let left = split[0];
    let right = split[1];

    let left_block = Block::default()
        .title(" SpaceFiler ")
        .borders(Borders::ALL);
    let left_inner = left_block.inner(left);
    frame.render_widget(left_block, left);

    let left_rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(6),
        Constraint::Min(8),
        Constraint::Length(7),
    ])
    .split(left_inner);

    let input_title = if app.input_mode {
        " Path (typing) "
    } else {
        " Path "
    };
    let path_block = Block::default().title(input_title).borders(Borders::ALL);
    let path_inner = path_block.inner(left_rows[0]);
    frame.render_widget(path_block, left_rows[0]);
    let path_style = if app.input_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    };
    frame.render_widget(
        Paragraph::new(app.path_input.as_str()).style(path_style),
        path_inner,
    );

    let progress_text = if app.is_scanning {
        app.scan_progress
            .as_ref()
            .map(progress_status)
            .unwrap_or_else(|| "Scanning...".to_string())
    } else {
        app.status.clone()
    };
    let progress = Paragraph::new(progress_text)
        .block(Block::default().title(" Status ").borders(Borders::ALL));
    frame.render_widget(progress, left_rows[1]);

    let selected_lines = {
        let mut lines = Vec::new();
        match app.session.as_ref() {
            Some(session) => {
                let tree = session.tree();
                lines.push(Line::from(vec![
                    Span::styled("View: ", Style::default().fg(Color::Gray)),
                    Span::raw(describe(tree, session.focused())),
                ]));
                match session.selected() {
                    Some(id) => {
                        lines.push(Line::from(vec![
                            Span::styled("Selected: ", Style::default().fg(Color::Gray)),
                            Span::raw(tree.path_of(id).display().to_string()),
                        ]));
                        lines.push(Line::from(Span::raw(describe(tree, id))));
                    }
                    None => lines.push(Line::from("Selected: (none)")),
                }
                if let Some(entry) = session.clipboard().peek() {
                    lines.push(Line::from(vec![
                        Span::styled("Clipboard: ", Style::default().fg(Color::Gray)),
                        Span::raw(format!("{:?} {}", entry.mode, entry.path.display())),
                    ]));
                }
                if let Some(marked) = app.marked.as_ref() {
                    lines.push(Line::from(vec![
                        Span::styled("Marked: ", Style::default().fg(Color::Gray)),
                        Span::raw(marked.display().to_string()),
                    ]));
                }
            }
            None => lines.push(Line::from("Nothing scanned")),
        }

        if let Some(instant) = app.last_scan_finished_at {
            lines.push(Line::from(format!(
                "Last scan: {}s ago",
                instant.elapsed().as_secs()
            )));
        }
        lines
    };

    frame.render_widget(
        Paragraph::new(selected_lines)
            .block(Block::default().title(" Selection ").borders(Borders::ALL)),
        left_rows[2],
    );

    let help_lines = vec![
        Line::from("Enter: scan   /: edit path   q: quit"),
        Line::from("Click: open dir / select file"),
        Line::from("u, right click: up   0-9: jump"),
        Line::from("d: duplicate   Del: delete"),
        Line::from("y/x: copy/cut   p: paste here"),
        Line::from("m: mark   M: move here   r: rescan"),
    ];
    frame.render_widget(
        Paragraph::new(help_lines).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        left_rows[3],
    );

    app.ui_layout.path_input_area = Some(path_inner);

    let right_rows = Layout::vertical([Constraint::Length(1), Constraint::Min(3)]).split(right);
    let crumbs: Vec<Span> = app
        .session
        .as_ref()
        .map(|session| {
            session
                .breadcrumb()
                .into_iter()
                .map(|name| Span::styled(format!(" {} ›", name), Style::default().fg(Color::Cyan)))
                .collect()
        })
        .unwrap_or_default();
    frame.render_widget(Paragraph::new(Line::from(crumbs)), right_rows[0]);
    app.ui_layout.breadcrumb_area = Some(right_rows[0]);

    let treemap_block = Block::default()
        .title(" Treemap (click a folder to open it, a file to select it) ")
        .borders(Borders::ALL);
    let treemap_inner = treemap_block.inner(right_rows[1]);
    frame.render_widget(treemap_block, right_rows[1]);
    app.ui_layout.treemap_inner_area = Some(treemap_inner);

    let tiles = app.build_visible_tiles(treemap_inner);
    if tiles.is_empty() {
        frame.render_widget(
            Paragraph::new("No treemap yet. Enter a path and scan.")
                .style(Style::default().fg(Color::Gray)),
            treemap_inner,
        );
    } else {
        let widget = TreemapWidget {
            tiles: &tiles,
            selected: app.session.as_ref().and_then(Session::selected),
            hovered: mouse.and_then(|(x, y)| app.hovered_tile(x, y)).map(|t| t.node),
            depth: app.session.as_ref().map(|s| s.navigation().depth()).unwrap_or(0),
        };
        frame.render_widget(widget, treemap_inner);
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, mut app: App) -> io::Result<()> {
    let mut mouse = None;

    loop {
        app.poll_scan_updates();
        app.poll_watcher();

        terminal.draw(|frame| {
            draw_ui(frame, &mut app, mouse);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(event) => {
                    mouse = Some((event.column, event.row));
                    app.on_mouse(event);
                }
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(&settings.log, Output::Discard)?;

    let fs = LocalFs::new(settings.exclude.clone(), settings.scan_threads);
    let auto_scan = cli.path.is_some() || settings.root.is_some();
    let start = settings.scan_root(cli.path);
    let mut app = App::new(fs, start.display().to_string());
    if auto_scan {
        app.input_mode = false;
        app.start_scan();
    }

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, app);

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(app_result?)
}
