//! Visualizer - frequency bars and the waveform panel
//!
//! Runs once per frame on the UI thread. The only audio it ever touches is
//! the sample window of the bound analysis tap; with nothing bound the bars
//! fall back to a low placeholder motion.

use crate::layout::{CanvasId, CanvasLayout};
use crate::theme::Theme;
use crate::viewport::OverviewViewport;
use crate::widgets::{BarsWidget, WaveformWidget};
use cue_analysis::{FrequencyBand, OverviewCache, OverviewProfile, DEFAULT_BANDS, FFT_SIZE};
use cue_audio::{PlaybackClock, TapHandle};
use cue_library::{PrefStore, TrackDescriptor};
use ratatui::buffer::Buffer;
use ratatui::widgets::Widget;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Ceiling of the placeholder bar motion
pub const PLACEHOLDER_LEVEL: f32 = 0.12;

const STYLE_KEY: &str = "waveform.style";

/// How the waveform panel draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveformStyle {
    /// Time-domain trace of the tap window
    #[default]
    Trace,
    /// Whole-track bars colored by progress
    ProgressBars,
    /// Simulated stereo pair of traces
    DualChannel,
    /// Amplitude segments tinted by level and dominant band
    Tinted,
    /// Zoomable full-track overview with playhead
    Overview,
}

impl WaveformStyle {
    pub const ALL: [WaveformStyle; 5] = [
        WaveformStyle::Trace,
        WaveformStyle::ProgressBars,
        WaveformStyle::DualChannel,
        WaveformStyle::Tinted,
        WaveformStyle::Overview,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WaveformStyle::Trace => "trace",
            WaveformStyle::ProgressBars => "progress",
            WaveformStyle::DualChannel => "dual",
            WaveformStyle::Tinted => "tinted",
            WaveformStyle::Overview => "overview",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// Whether the style draws the full-track overview
    pub fn uses_overview(self) -> bool {
        matches!(self, WaveformStyle::ProgressBars | WaveformStyle::Overview)
    }
}

/// Drives every visual surface from the bound tap
pub struct Visualizer {
    tap: Option<TapHandle>,
    bar_canvases: Vec<CanvasId>,
    waveform_canvas: Option<CanvasId>,
    style: WaveformStyle,
    viewport: OverviewViewport,
    overviews: OverviewCache,
    prefs: Box<dyn PrefStore>,
    started: Instant,

    // Latest frame
    bands: Vec<f32>,
    samples: Vec<f32>,
    peak: f32,
    dominant: FrequencyBand,
    progress: Option<f64>,
    overview: Option<Arc<OverviewProfile>>,
}

impl Visualizer {
    /// Create a visualizer, restoring style and viewport from `prefs`
    pub fn new(prefs: Box<dyn PrefStore>, now: Instant) -> Self {
        let style = prefs
            .get(STYLE_KEY)
            .and_then(|name| WaveformStyle::from_name(&name))
            .unwrap_or_default();
        let viewport = OverviewViewport::load(prefs.as_ref());

        Self {
            tap: None,
            bar_canvases: Vec::new(),
            waveform_canvas: None,
            style,
            viewport,
            overviews: OverviewCache::new(),
            prefs,
            started: now,
            bands: vec![0.0; DEFAULT_BANDS],
            samples: vec![0.0; FFT_SIZE],
            peak: 0.0,
            dominant: FrequencyBand::default(),
            progress: None,
            overview: None,
        }
    }

    /// Bind the tap to visualize; binding the same tap again is a no-op
    ///
    /// Returns true if the binding changed.
    pub fn bind(&mut self, tap: Option<TapHandle>) -> bool {
        let same = match (&self.tap, &tap) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if same {
            return false;
        }

        debug!(
            "Visualizer {}",
            if tap.is_some() { "bound to new tap" } else { "unbound" }
        );
        self.tap = tap;
        if self.tap.is_none() {
            self.samples.fill(0.0);
            self.peak = 0.0;
        }
        true
    }

    pub fn is_bound(&self) -> bool {
        self.tap.is_some()
    }

    /// Add a canvas that draws frequency bars
    pub fn add_bar_canvas(&mut self, id: impl Into<CanvasId>) {
        let id = id.into();
        if !self.bar_canvases.contains(&id) {
            self.bar_canvases.push(id);
        }
    }

    pub fn remove_bar_canvas(&mut self, id: &CanvasId) {
        self.bar_canvases.retain(|c| c != id);
    }

    pub fn bar_canvases(&self) -> &[CanvasId] {
        &self.bar_canvases
    }

    /// Move the waveform panel to a canvas, replacing the previous one
    pub fn set_waveform_canvas(&mut self, id: Option<CanvasId>) {
        self.waveform_canvas = id;
    }

    pub fn waveform_canvas(&self) -> Option<&CanvasId> {
        self.waveform_canvas.as_ref()
    }

    pub fn style(&self) -> WaveformStyle {
        self.style
    }

    pub fn set_style(&mut self, style: WaveformStyle) {
        self.style = style;
        if let Err(e) = self.prefs.set(STYLE_KEY, style.name()) {
            warn!("Failed to persist waveform style: {}", e);
        }
    }

    pub fn cycle_style(&mut self) -> WaveformStyle {
        self.set_style(self.style.next());
        self.style
    }

    pub fn viewport(&self) -> &OverviewViewport {
        &self.viewport
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.save_viewport();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.save_viewport();
    }

    pub fn reset_zoom(&mut self) {
        self.viewport.reset_zoom();
        self.save_viewport();
    }

    /// Manual pan by a fraction of the visible window
    pub fn pan(&mut self, delta: f64, now: Instant) {
        self.viewport.pan(delta, now);
        self.save_viewport();
    }

    /// Persist the viewport, including auto-scroll movement
    pub fn save_viewport(&mut self) {
        if let Err(e) = self.viewport.save(self.prefs.as_mut()) {
            warn!("Failed to persist overview viewport: {}", e);
        }
    }

    /// Advance one frame
    ///
    /// `track` and `clock` describe the audible track, if any.
    pub fn update(
        &mut self,
        now: Instant,
        track: Option<&TrackDescriptor>,
        clock: Option<PlaybackClock>,
    ) {
        match &self.tap {
            Some(tap) => {
                let mut tap = tap.lock();
                tap.refresh();
                let bands = tap.frequency_data();
                self.bands.resize(bands.len(), 0.0);
                self.bands.copy_from_slice(bands);
                let window = tap.time_data();
                self.samples.resize(window.len(), 0.0);
                self.samples.copy_from_slice(window);
                self.peak = tap.peak();
                self.dominant = tap.dominant_band();
            }
            None => self.placeholder(now),
        }

        self.progress = clock.and_then(|c| {
            let duration = c.duration?.as_secs_f64();
            (duration > 0.0).then(|| (c.position.as_secs_f64() / duration).clamp(0.0, 1.0))
        });

        self.overview = match track {
            Some(track) if self.style.uses_overview() => {
                let duration = clock.and_then(|c| c.duration).or(track.duration());
                Some(self.overviews.get_or_generate(&track.identity_key(), duration))
            }
            _ => None,
        };

        if self.style == WaveformStyle::Overview {
            if let Some(progress) = self.progress {
                self.viewport.follow(progress, now);
            }
        }
    }

    /// Gentle motion so the bars never sit dead while nothing plays
    fn placeholder(&mut self, now: Instant) {
        let t = now.saturating_duration_since(self.started).as_secs_f32();
        let half = PLACEHOLDER_LEVEL / 2.0;
        self.bands.resize(DEFAULT_BANDS, 0.0);
        for (i, band) in self.bands.iter_mut().enumerate() {
            *band = half + half * (t * 2.0 + i as f32 * 0.4).sin();
        }
        self.dominant = FrequencyBand::default();
    }

    pub fn bands(&self) -> &[f32] {
        &self.bands
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    pub fn overview(&self) -> Option<&Arc<OverviewProfile>> {
        self.overview.as_ref()
    }

    pub fn cached_overviews(&self) -> usize {
        self.overviews.len()
    }

    /// Draw every canvas present in `layout`; missing canvases are skipped
    pub fn render(&self, layout: &CanvasLayout, theme: &Theme, buf: &mut Buffer) {
        for id in &self.bar_canvases {
            if let Some(area) = layout.rect(id) {
                BarsWidget::new(&self.bands, theme)
                    .live(self.tap.is_some())
                    .render(area, buf);
            }
        }

        if let Some(area) = self.waveform_canvas.as_ref().and_then(|id| layout.rect(id)) {
            WaveformWidget::new(theme, self.style, &self.viewport)
                .samples(&self.samples, self.peak)
                .dominant(self.dominant)
                .progress(self.progress)
                .overview(self.overview.as_deref())
                .render(area, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cue_audio::{AnalysisTap, ElementId};
    use cue_library::MemoryPrefs;
    use ratatui::layout::Rect;
    use std::time::Duration;

    fn visualizer() -> Visualizer {
        Visualizer::new(Box::new(MemoryPrefs::new()), Instant::now())
    }

    fn track() -> TrackDescriptor {
        TrackDescriptor::new("Artist", "Title", "Artist - Title.mp3")
            .unwrap()
            .with_duration(Duration::from_secs(200))
    }

    #[test]
    fn test_placeholder_stays_low() {
        let mut vis = visualizer();
        let t0 = Instant::now();
        for frame in 0..120 {
            vis.update(t0 + Duration::from_millis(frame * 33), None, None);
            assert!(vis.bands().iter().all(|b| (0.0..=PLACEHOLDER_LEVEL).contains(b)));
        }
    }

    #[test]
    fn test_bind_same_tap_is_noop() {
        let mut vis = visualizer();
        let tap = AnalysisTap::new(ElementId::new(1), 48000).into_handle();

        assert!(vis.bind(Some(tap.clone())));
        assert!(!vis.bind(Some(tap.clone())));

        let other = AnalysisTap::new(ElementId::new(2), 48000).into_handle();
        assert!(vis.bind(Some(other)));
        assert!(vis.bind(None));
        assert!(!vis.bind(None));
        assert!(!vis.is_bound());
    }

    #[test]
    fn test_bound_tap_drives_samples() {
        let mut vis = visualizer();
        let tap = AnalysisTap::new(ElementId::new(1), 48000).into_handle();
        let tone: Vec<f32> = (0..FFT_SIZE).map(|i| (i as f32 * 0.05).sin()).collect();
        tap.lock().feed(&tone);

        vis.bind(Some(tap));
        vis.update(Instant::now(), None, None);
        assert_eq!(vis.samples(), tone.as_slice());
        assert!(vis.bands().iter().any(|b| *b > PLACEHOLDER_LEVEL));
    }

    #[test]
    fn test_style_persists() {
        let mut prefs = MemoryPrefs::new();
        prefs.set(STYLE_KEY, "tinted").unwrap();
        let vis = Visualizer::new(Box::new(prefs), Instant::now());
        assert_eq!(vis.style(), WaveformStyle::Tinted);

        let mut vis = visualizer();
        assert_eq!(vis.cycle_style(), WaveformStyle::ProgressBars);
        assert_eq!(vis.prefs.get(STYLE_KEY).as_deref(), Some("progress"));
    }

    #[test]
    fn test_style_cycle_wraps() {
        let mut style = WaveformStyle::Trace;
        for _ in 0..WaveformStyle::ALL.len() {
            style = style.next();
        }
        assert_eq!(style, WaveformStyle::Trace);
        assert_eq!(WaveformStyle::from_name("nope"), None);
    }

    #[test]
    fn test_overview_memoized_per_track() {
        let mut vis = visualizer();
        vis.set_style(WaveformStyle::Overview);
        let track = track();
        let clock = PlaybackClock {
            position: Duration::from_secs(100),
            duration: Some(Duration::from_secs(200)),
        };

        let now = Instant::now();
        vis.update(now, Some(&track), Some(clock));
        let first = vis.overview().cloned().unwrap();
        vis.update(now + Duration::from_millis(33), Some(&track), Some(clock));
        let second = vis.overview().cloned().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(vis.cached_overviews(), 1);
        assert_eq!(vis.progress(), Some(0.5));
    }

    #[test]
    fn test_overview_follows_playhead() {
        let mut vis = visualizer();
        vis.set_style(WaveformStyle::Overview);
        vis.zoom_in();
        vis.zoom_in();
        let clock = PlaybackClock {
            position: Duration::from_secs(150),
            duration: Some(Duration::from_secs(200)),
        };
        vis.update(Instant::now(), Some(&track()), Some(clock));
        assert!(vis.viewport().offset() > 0.0);
    }

    #[test]
    fn test_render_skips_missing_canvases() {
        let mut vis = visualizer();
        vis.add_bar_canvas("bars");
        vis.add_bar_canvas("bars");
        vis.add_bar_canvas("mini");
        assert_eq!(vis.bar_canvases().len(), 2);
        vis.set_waveform_canvas(Some("wave".into()));
        vis.update(Instant::now(), None, None);

        let mut layout = CanvasLayout::new();
        layout.place("bars", Rect::new(0, 0, 40, 8));
        let mut buf = Buffer::empty(Rect::new(0, 0, 40, 16));
        vis.render(&layout, &Theme::default(), &mut buf);
    }
}
