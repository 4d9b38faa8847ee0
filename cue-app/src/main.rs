//! Cue - library track previewer
//!
//! Terminal front-end with vintage CRT aesthetic: browse a folder of tracks,
//! preview them, and chain them into an autoplay queue with crossfades.

use std::fs::{self, OpenOptions};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Terminal,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cue_audio::{EngineBackend, PlayerEvent, PlayerOptions, PreviewPlayer};
use cue_library::{Config, FileIndex, MemoryPrefs, PrefStore, ScanConfig, SqlitePrefs};
use cue_tui::{
    App, CanvasLayout, HelpWidget, LibraryWidget, StatusBarWidget, Theme, Visualizer,
};

/// Frame rate for UI updates and player ticks
const FPS: u64 = 30;

const BARS_CANVAS: &str = "bars";
const WAVEFORM_CANVAS: &str = "waveform";

/// Overview pan per key press, as a fraction of the visible window
const PAN_STEP: f64 = 0.25;
/// Rows moved by PgUp / PgDn
const PAGE_ROWS: isize = 10;

type Player = PreviewPlayer<EngineBackend>;

fn main() -> anyhow::Result<()> {
    // Before anything that may warn
    init_logging()?;
    let mut config = Config::load();

    // A folder on the command line replaces the remembered one
    let arg_folder = std::env::args().nth(1).map(PathBuf::from);
    let folder = arg_folder.clone().or_else(|| config.library_folder.clone());

    let files = match &folder {
        Some(directory) => FileIndex::scan(&ScanConfig {
            directory: directory.clone(),
            ..Default::default()
        }),
        None => FileIndex::new(),
    };
    info!("Library has {} files", files.len());
    let tracks = files.tracks();

    let prefs: Box<dyn PrefStore> = match SqlitePrefs::open(&SqlitePrefs::default_path()) {
        Ok(prefs) => Box::new(prefs),
        Err(e) => {
            warn!("Preferences unavailable, using defaults: {}", e);
            Box::new(MemoryPrefs::new())
        }
    };

    let backend = EngineBackend::spawn().context("Failed to start audio output")?;
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let now = Instant::now();
    let player = PreviewPlayer::new(backend, files, PlayerOptions::from(&config), event_tx, now);

    let mut visualizer = Visualizer::new(prefs, now);
    visualizer.add_bar_canvas(BARS_CANVAS);
    visualizer.set_waveform_canvas(Some(WAVEFORM_CANVAS.into()));

    let mut app = App::new();
    let track_count = tracks.len();
    app.state.library.set_tracks(tracks);
    if track_count > 0 {
        app.state.set_message(
            format!("Cue - Loaded {} tracks | Press ? for help", track_count),
            now,
        );
    } else {
        app.state
            .set_message("Cue - No tracks. Run `cue <folder>` to pick a library", now);
    }

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, app, player, visualizer, event_rx);

    // Cleanup
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if arg_folder.is_some() && arg_folder != config.library_folder {
        config.library_folder = arg_folder;
        if let Err(e) = config.save() {
            warn!("Failed to save config: {}", e);
        }
    }

    result
}

/// Log to a file under the data directory; the terminal belongs to the UI
fn init_logging() -> anyhow::Result<()> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cue");
    fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("cue.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("CUE_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut player: Player,
    mut visualizer: Visualizer,
    events: Receiver<PlayerEvent>,
) -> anyhow::Result<()> {
    let frame_duration = Duration::from_millis(1000 / FPS);
    let mut last_frame = Instant::now();

    while !app.should_quit {
        let now = Instant::now();

        player.tick(now);
        while let Ok(event) = events.try_recv() {
            app.state.handle_player_event(event, now);
        }

        visualizer.bind(player.visual_tap());
        visualizer.update(now, player.now_playing(), player.clock());
        app.state.tick(now);

        terminal.draw(|frame| render_ui(frame, &mut app, &player, &visualizer))?;

        let timeout = frame_duration.saturating_sub(last_frame.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key, &mut app, &mut player, &mut visualizer, Instant::now());
                }
            }
        }

        // Maintain frame rate
        let elapsed = last_frame.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
        last_frame = Instant::now();
    }

    visualizer.save_viewport();
    player.stop();
    info!("Shutting down");
    Ok(())
}

fn handle_key(
    key: KeyEvent,
    app: &mut App,
    player: &mut Player,
    visualizer: &mut Visualizer,
    now: Instant,
) {
    if key.code == KeyCode::Char('q')
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
    {
        app.quit();
        return;
    }

    if app.state.show_help {
        match key.code {
            KeyCode::Esc | KeyCode::Char('?') => app.state.toggle_help(),
            KeyCode::Up | KeyCode::Char('k') => app.state.help_scroll_up(),
            KeyCode::Down | KeyCode::Char('j') => app.state.help_scroll_down(),
            _ => {}
        }
        return;
    }

    let state = &mut app.state;
    match key.code {
        KeyCode::Char('?') => state.toggle_help(),
        KeyCode::Esc => state.clear_message(),

        // Library
        KeyCode::Up | KeyCode::Char('k') => state.library.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => state.library.select_next(),
        KeyCode::PageUp => state.library.page(-PAGE_ROWS),
        KeyCode::PageDown => state.library.page(PAGE_ROWS),
        KeyCode::Char('g') => state.library.select_first(),
        KeyCode::Char('G') => state.library.select_last(),
        KeyCode::Enter => {
            if let Some(track) = state.library.selected_track() {
                // Failures come back as notices
                drop(player.preview(track.clone()));
            }
        }
        KeyCode::Char(' ') => player.toggle_pause(),
        KeyCode::Char('s') => player.stop(),

        // Queue
        KeyCode::Char('a') => {
            if state.library.tracks.is_empty() {
                state.set_warning("Nothing to queue", now);
            } else {
                player.queue_all(state.library.tracks.clone());
                player.skip_to_track(state.library.selected_index, now);
            }
        }
        KeyCode::Char('n') => player.skip_to_next(now),
        KeyCode::Char('p') => player.play_previous(now),
        KeyCode::Char('m') => {
            let status = player.queue().status();
            let enabled = !status.automix;
            player.set_auto_mix(enabled, status.crossfade.as_secs_f32());
            state.set_message(
                format!("Automix {}", if enabled { "on" } else { "off" }),
                now,
            );
        }
        KeyCode::Char('[') | KeyCode::Char(']') => {
            let status = player.queue().status();
            let step = if key.code == KeyCode::Char(']') { 1.0 } else { -1.0 };
            player.set_auto_mix(status.automix, status.crossfade.as_secs_f32() + step);
            let crossfade = player.queue().crossfade().as_secs_f32();
            state.set_message(format!("Crossfade {:.0}s", crossfade), now);
        }

        // Waveform
        KeyCode::Char('w') => {
            let style = visualizer.cycle_style();
            state.set_message(format!("Waveform: {}", style.name()), now);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => visualizer.zoom_in(),
        KeyCode::Char('-') => visualizer.zoom_out(),
        KeyCode::Char('0') => visualizer.reset_zoom(),
        KeyCode::Left => visualizer.pan(-PAN_STEP, now),
        KeyCode::Right => visualizer.pan(PAN_STEP, now),

        KeyCode::Char('t') => state.cycle_theme(now),
        _ => {}
    }
}

fn render_ui(frame: &mut ratatui::Frame, app: &mut App, player: &Player, visualizer: &Visualizer) {
    let area = frame.area();
    let theme = app.state.theme.clone();

    // Clear with background
    frame.render_widget(Block::default().style(theme.normal()), area);

    let chunks = Layout::vertical([
        Constraint::Length(1), // Title
        Constraint::Min(6),    // Library
        Constraint::Length(8), // Frequency bars
        Constraint::Length(8), // Waveform
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    render_title(frame, chunks[0], &theme);

    let library = LibraryWidget::new(&mut app.state.library, &theme);
    frame.render_widget(library, chunks[1]);

    let mut layout = CanvasLayout::new();
    layout.place(BARS_CANVAS, chunks[2]);
    layout.place(WAVEFORM_CANVAS, chunks[3]);
    visualizer.render(&layout, &theme, frame.buffer_mut());

    let status = StatusBarWidget::new(&theme)
        .now_playing(player.now_playing(), player.clock(), player.is_paused())
        .queue(app.state.queue.as_ref())
        .message(app.state.message.as_deref(), app.state.message_type);
    frame.render_widget(status, chunks[4]);

    if app.state.show_help {
        let help_area = centered_rect(70, area.height.saturating_sub(4), area);
        frame.render_widget(HelpWidget::new(&theme).scroll(app.state.help_scroll), help_area);
    }
}

fn render_title(frame: &mut ratatui::Frame, area: Rect, theme: &Theme) {
    let title_text = " CUE - library preview ";
    let padding = (area.width as usize).saturating_sub(title_text.len()) / 2;
    let padded = format!(
        "{:═<pad$}{}{:═<rest$}",
        "",
        title_text,
        "",
        pad = padding,
        rest = (area.width as usize).saturating_sub(padding + title_text.len())
    );

    let line = Line::from(Span::styled(padded, theme.title()));
    frame.render_widget(Paragraph::new(line), area);
}

/// Create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
