//! Media transport for the watch page.
//!
//! [`TransportController`] is the state machine; [`PlayerSession`] gives it a
//! task of its own for the lifetime of a mounted player.

mod controller;
mod element;
mod session;
mod state;

pub use controller::TransportController;
pub use element::{
    DisplaySurface, MediaElement, MediaEvent, PendingRequest, PlatformEvent, PlatformFuture,
    RequestKind,
};
pub use session::{Command, PlayerHandle, PlayerSession};
pub use state::{CONTROLS_HIDE_DELAY, PLAYBACK_RATES, Phase, PlaybackState, format_time};
