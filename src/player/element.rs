use std::{future::Future, pin::Pin};

use crate::error::PlatformError;

/// Outcome of an asynchronous platform request. Owns everything it needs so it
/// can run after the call that produced it returns.
pub type PlatformFuture = Pin<Box<dyn Future<Output = Result<(), PlatformError>> + Send + 'static>>;

/// One playable element bound to a progressive-download source.
pub trait MediaElement: Send + 'static {
    fn load(&mut self, url: &str);
    fn set_current_time(&mut self, seconds: f64);
    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
    fn set_playback_rate(&mut self, rate: f64);
    /// May be rejected, e.g. by an autoplay policy.
    fn play(&mut self) -> PlatformFuture;
    fn pause(&mut self);
}

/// The host's fullscreen and picture-in-picture facilities. Fullscreen is
/// requested on the player's container so the overlay stays visible.
pub trait DisplaySurface: Send + 'static {
    fn request_fullscreen(&mut self) -> PlatformFuture;
    fn exit_fullscreen(&mut self) -> PlatformFuture;
    fn request_picture_in_picture(&mut self) -> PlatformFuture;
    fn exit_picture_in_picture(&mut self) -> PlatformFuture;
}

/// Notifications raised by the media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    TimeUpdate { current_time: f64 },
    LoadedMetadata { duration: f64 },
    Ended,
}

/// Ambient platform notifications. These are the only source of truth for
/// the fullscreen and picture-in-picture flags; the user can leave either mode
/// without going through the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    FullscreenChanged { active: bool },
    PictureInPictureChanged { active: bool },
}

/// What an in-flight [`PlatformFuture`] was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    PlaybackStart { generation: u64 },
    EnterFullscreen,
    ExitFullscreen,
    EnterPictureInPicture,
    ExitPictureInPicture,
}

pub struct PendingRequest {
    pub kind: RequestKind,
    pub future: PlatformFuture,
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
