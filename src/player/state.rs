use std::time::Duration;

use serde::Serialize;

/// Speeds offered by the settings menu. The controller accepts any positive
/// rate; this list is only what the menu renders.
pub const PLAYBACK_RATES: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Idle time after the last pointer movement before controls fade out.
pub const CONTROLS_HIDE_DELAY: Duration = Duration::from_millis(3000);

/// Where the transport is in its lifecycle for the current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Source assigned, metadata not seen yet. Paused.
    Loading,
    /// Duration known, paused.
    Ready,
    Playing,
    /// Reached the end of the current source.
    Ended,
}

/// Everything a player surface renders. One instance per mounted player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub source: String,
    pub phase: Phase,
    pub current_time: f64,
    /// `None` until the element reports metadata.
    pub duration: Option<f64>,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub fullscreen: bool,
    pub theater_mode: bool,
    pub pip_active: bool,
    pub controls_visible: bool,
}

impl PlaybackState {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            phase: Phase::Loading,
            current_time: 0.0,
            duration: None,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            fullscreen: false,
            theater_mode: false,
            pip_active: false,
            controls_visible: true,
        }
    }

    pub fn playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// Drops everything tied to the previous source. Volume, mute, rate and
    /// the presentational flags belong to the player, not the source.
    pub(crate) fn reset_for_source(&mut self, source: &str) {
        self.source = source.to_string();
        self.phase = Phase::Loading;
        self.current_time = 0.0;
        self.duration = None;
        self.controls_visible = true;
    }

    /// Phase to fall back to when playback stops without reaching the end.
    pub(crate) fn paused_phase(&self) -> Phase {
        if self.duration.is_some() {
            Phase::Ready
        } else {
            Phase::Loading
        }
    }

    /// Zero volume reads as muted on the volume icon, even though the mute
    /// flag itself is untouched.
    pub fn shows_muted(&self) -> bool {
        self.muted || self.volume == 0.0
    }

    /// Value the volume slider shows.
    pub fn slider_volume(&self) -> f64 {
        if self.muted { 0.0 } else { self.volume }
    }

    /// Width of the progress bar in `[0, 1]`. Zero while the duration is
    /// unknown or zero.
    pub fn progress_fraction(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.current_time / duration).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// `"elapsed / total"` as shown next to the transport buttons.
    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.current_time),
            format_time(self.duration.unwrap_or(f64::NAN))
        )
    }
}

/// `m:ss` with unpadded minutes. Unknown, negative or non-finite input
/// renders as `0:00`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}
