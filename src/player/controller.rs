use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    element::{
        DisplaySurface, MediaElement, MediaEvent, PendingRequest, PlatformEvent, RequestKind,
    },
    state::{CONTROLS_HIDE_DELAY, Phase, PlaybackState},
};
use crate::error::PlatformError;

type TimeListener = Box<dyn FnMut(f64) + Send>;
type EndedListener = Box<dyn FnMut() + Send>;

/// Transport state machine for a single media element.
///
/// Operations are synchronous. Anything the platform answers asynchronously
/// comes back as a [`PendingRequest`]; the caller awaits it and reports the
/// result through [`TransportController::complete`].
pub struct TransportController<E, S> {
    element: E,
    surface: S,
    state: PlaybackState,
    hide_deadline: Option<Instant>,
    /// Bumped on every play/pause/source change so a late rejection of an
    /// older start request cannot stop a newer one.
    start_generation: u64,
    on_time_update: Option<TimeListener>,
    on_ended: Option<EndedListener>,
}

impl<E: MediaElement, S: DisplaySurface> TransportController<E, S> {
    pub fn new(mut element: E, surface: S, source: impl Into<String>) -> Self {
        let state = PlaybackState::new(source);
        element.load(&state.source);
        Self {
            element,
            surface,
            state,
            hide_deadline: None,
            start_generation: 0,
            on_time_update: None,
            on_ended: None,
        }
    }

    pub fn on_time_update(&mut self, listener: impl FnMut(f64) + Send + 'static) {
        self.on_time_update = Some(Box::new(listener));
    }

    pub fn on_ended(&mut self, listener: impl FnMut() + Send + 'static) {
        self.on_ended = Some(Box::new(listener));
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_deadline
    }

    /// Points the element at a new source and resets playback.
    pub fn set_source(&mut self, url: &str) {
        if self.state.playing() {
            self.element.pause();
        }
        self.start_generation += 1;
        self.hide_deadline = None;
        self.state.reset_for_source(url);
        self.element.load(url);
        debug!(source = url, "player source replaced");
    }

    /// Starts playback when paused, stops it when playing. Starting is
    /// optimistic; a rejected start is rolled back in [`Self::complete`].
    pub fn toggle_playback(&mut self) -> Option<PendingRequest> {
        self.start_generation += 1;
        if self.state.playing() {
            self.element.pause();
            self.state.phase = self.state.paused_phase();
            debug!(position = self.state.current_time, "playback paused");
            return None;
        }

        self.state.phase = Phase::Playing;
        debug!(position = self.state.current_time, "playback requested");
        Some(PendingRequest {
            kind: RequestKind::PlaybackStart {
                generation: self.start_generation,
            },
            future: self.element.play(),
        })
    }

    /// Seeks to `fraction` of the duration, clamped to `[0, duration]`. Does
    /// nothing before the duration is known.
    pub fn seek_to_fraction(&mut self, fraction: f64) {
        if fraction.is_nan() {
            return;
        }
        let Some(duration) = self.state.duration else {
            debug!("seek ignored before metadata");
            return;
        };
        self.seek_to(fraction.clamp(0.0, 1.0) * duration);
    }

    /// Seeks from a click at `offset_x` pixels into a progress track
    /// `track_width` pixels wide.
    pub fn seek_to_pointer(&mut self, offset_x: f64, track_width: f64) {
        if !(track_width > 0.0) {
            return;
        }
        self.seek_to_fraction(offset_x / track_width);
    }

    pub fn seek_to(&mut self, seconds: f64) {
        if seconds.is_nan() {
            return;
        }
        let upper = self.state.duration.unwrap_or(0.0).max(0.0);
        let target = seconds.clamp(0.0, upper);
        self.element.set_current_time(target);
        self.state.current_time = target;
        if self.state.phase == Phase::Ended {
            self.state.phase = Phase::Ready;
        }
    }

    /// Sets the element volume, clamped to `[0, 1]`. Any audible level also
    /// lifts the mute flag.
    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.element.set_volume(volume);
        self.state.volume = volume;
        if volume > 0.0 && self.state.muted {
            self.element.set_muted(false);
            self.state.muted = false;
        }
    }

    /// Flips the mute flag. The stored volume is left alone so unmuting comes
    /// back at the same level.
    pub fn toggle_mute(&mut self) {
        let muted = !self.state.muted;
        self.element.set_muted(muted);
        self.state.muted = muted;
    }

    /// Applies any positive, finite rate.
    pub fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "ignoring invalid playback rate");
            return;
        }
        self.element.set_playback_rate(rate);
        self.state.playback_rate = rate;
    }

    /// Asks the platform to enter or leave fullscreen. The flag itself only
    /// changes when the platform reports the change.
    pub fn toggle_fullscreen(&mut self) -> PendingRequest {
        if self.state.fullscreen {
            PendingRequest {
                kind: RequestKind::ExitFullscreen,
                future: self.surface.exit_fullscreen(),
            }
        } else {
            PendingRequest {
                kind: RequestKind::EnterFullscreen,
                future: self.surface.request_fullscreen(),
            }
        }
    }

    /// Best effort; failures are logged in [`Self::complete`].
    pub fn toggle_picture_in_picture(&mut self) -> PendingRequest {
        if self.state.pip_active {
            PendingRequest {
                kind: RequestKind::ExitPictureInPicture,
                future: self.surface.exit_picture_in_picture(),
            }
        } else {
            PendingRequest {
                kind: RequestKind::EnterPictureInPicture,
                future: self.surface.request_picture_in_picture(),
            }
        }
    }

    pub fn toggle_theater_mode(&mut self) {
        self.state.theater_mode = !self.state.theater_mode;
    }

    /// Shows the controls and, while playing, schedules them to hide after
    /// [`CONTROLS_HIDE_DELAY`]. Any earlier deadline is discarded.
    pub fn pointer_moved(&mut self, now: Instant) {
        self.hide_deadline = None;
        self.state.controls_visible = true;
        if self.state.playing() {
            self.hide_deadline = Some(now + CONTROLS_HIDE_DELAY);
        }
    }

    pub fn pointer_left(&mut self) {
        if self.state.playing() {
            self.hide_deadline = None;
            self.state.controls_visible = false;
        }
    }

    /// Fires the hide timer if its deadline has passed. Returns whether the
    /// timer was due.
    pub fn hide_timer_elapsed(&mut self, now: Instant) -> bool {
        match self.hide_deadline {
            Some(deadline) if now >= deadline => {
                self.hide_deadline = None;
                if self.state.playing() {
                    self.state.controls_visible = false;
                }
                true
            }
            _ => false,
        }
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::TimeUpdate { current_time } => {
                if !current_time.is_finite() {
                    return;
                }
                self.state.current_time = current_time.max(0.0);
                if let Some(listener) = self.on_time_update.as_mut() {
                    listener(self.state.current_time);
                }
            }
            MediaEvent::LoadedMetadata { duration } => {
                self.state.duration =
                    (duration.is_finite() && duration >= 0.0).then_some(duration);
                if self.state.phase == Phase::Loading && self.state.duration.is_some() {
                    self.state.phase = Phase::Ready;
                }
                debug!(duration = ?self.state.duration, "metadata loaded");
            }
            MediaEvent::Ended => {
                self.start_generation += 1;
                self.hide_deadline = None;
                self.state.phase = Phase::Ended;
                if let Some(listener) = self.on_ended.as_mut() {
                    listener();
                }
            }
        }
    }

    pub fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::FullscreenChanged { active } => self.state.fullscreen = active,
            PlatformEvent::PictureInPictureChanged { active } => self.state.pip_active = active,
        }
    }

    /// Reconciles state with the outcome of a [`PendingRequest`].
    pub fn complete(&mut self, kind: RequestKind, result: Result<(), PlatformError>) {
        let Err(err) = result else {
            return;
        };
        match kind {
            RequestKind::PlaybackStart { generation } => {
                if generation == self.start_generation && self.state.playing() {
                    self.state.phase = self.state.paused_phase();
                    self.hide_deadline = None;
                    self.state.controls_visible = true;
                }
                warn!(error = %err, "playback start rejected");
            }
            RequestKind::EnterFullscreen | RequestKind::ExitFullscreen => {
                warn!(?kind, error = %err, "fullscreen request failed");
            }
            RequestKind::EnterPictureInPicture | RequestKind::ExitPictureInPicture => {
                warn!(?kind, error = %err, "picture-in-picture request failed");
            }
        }
    }
}
