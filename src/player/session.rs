//! Event loop that owns one mounted player.
//!
//! Commands from the page, element notifications, ambient platform
//! notifications, completed platform requests and the controls timer all
//! arrive on one task, so handlers interleave but never overlap. Dropping the
//! [`PlayerHandle`] unmounts the player: the loop exits, listeners are dropped
//! and the timer goes with it.

use tokio::{
    sync::{broadcast, mpsc, watch},
    task::{JoinHandle, JoinSet},
    time::{self, Instant},
};
use tracing::{debug, warn};

use super::{
    controller::TransportController,
    element::{DisplaySurface, MediaElement, MediaEvent, PendingRequest, PlatformEvent, RequestKind},
    state::PlaybackState,
};
use crate::error::PlatformError;

/// User-initiated operations on a mounted player.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePlayback,
    SeekToFraction(f64),
    SeekToPointer { offset_x: f64, track_width: f64 },
    SetVolume(f64),
    ToggleMute,
    SetPlaybackRate(f64),
    ToggleFullscreen,
    TogglePictureInPicture,
    ToggleTheaterMode,
    PointerMoved,
    PointerLeft,
    SetSource(String),
}

pub struct PlayerSession<E, S> {
    controller: TransportController<E, S>,
    media_events: mpsc::UnboundedReceiver<MediaEvent>,
    platform_events: broadcast::Receiver<PlatformEvent>,
}

/// Page-side handle of a running [`PlayerSession`].
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<()>,
}

impl<E: MediaElement, S: DisplaySurface> PlayerSession<E, S> {
    pub fn new(
        controller: TransportController<E, S>,
        media_events: mpsc::UnboundedReceiver<MediaEvent>,
        platform_events: broadcast::Receiver<PlatformEvent>,
    ) -> Self {
        Self {
            controller,
            media_events,
            platform_events,
        }
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(self) -> PlayerHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(self.controller.state().clone());
        let task = tokio::spawn(self.run(command_rx, state_tx));
        PlayerHandle {
            commands,
            state,
            task,
        }
    }

    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<PlaybackState>,
    ) {
        let PlayerSession {
            mut controller,
            mut media_events,
            mut platform_events,
        } = self;
        let mut pending: JoinSet<(RequestKind, Result<(), PlatformError>)> = JoinSet::new();
        let mut media_open = true;
        let mut platform_open = true;

        loop {
            let hide_at = controller.hide_deadline();
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if let Some(PendingRequest { kind, future }) =
                        dispatch(&mut controller, command, Instant::now())
                    {
                        pending.spawn(async move { (kind, future.await) });
                    }
                }
                event = media_events.recv(), if media_open => match event {
                    Some(event) => controller.handle_media_event(event),
                    None => media_open = false,
                },
                event = platform_events.recv(), if platform_open => match event {
                    Ok(event) => controller.handle_platform_event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed platform change notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => platform_open = false,
                },
                Some(joined) = pending.join_next(), if !pending.is_empty() => match joined {
                    Ok((kind, result)) => controller.complete(kind, result),
                    Err(err) => warn!(error = %err, "platform request task failed"),
                },
                _ = time::sleep_until(hide_at.unwrap_or_else(Instant::now)), if hide_at.is_some() => {
                    controller.hide_timer_elapsed(Instant::now());
                }
            }

            state_tx.send_if_modified(|published| {
                if *published != *controller.state() {
                    *published = controller.state().clone();
                    true
                } else {
                    false
                }
            });
        }

        pending.abort_all();
        debug!(source = %controller.state().source, "player unmounted");
    }
}

fn dispatch<E: MediaElement, S: DisplaySurface>(
    controller: &mut TransportController<E, S>,
    command: Command,
    now: Instant,
) -> Option<PendingRequest> {
    match command {
        Command::TogglePlayback => return controller.toggle_playback(),
        Command::SeekToFraction(fraction) => controller.seek_to_fraction(fraction),
        Command::SeekToPointer {
            offset_x,
            track_width,
        } => controller.seek_to_pointer(offset_x, track_width),
        Command::SetVolume(volume) => controller.set_volume(volume),
        Command::ToggleMute => controller.toggle_mute(),
        Command::SetPlaybackRate(rate) => controller.set_playback_rate(rate),
        Command::ToggleFullscreen => return Some(controller.toggle_fullscreen()),
        Command::TogglePictureInPicture => return Some(controller.toggle_picture_in_picture()),
        Command::ToggleTheaterMode => controller.toggle_theater_mode(),
        Command::PointerMoved => controller.pointer_moved(now),
        Command::PointerLeft => controller.pointer_left(),
        Command::SetSource(url) => controller.set_source(&url),
    }
    None
}

impl PlayerHandle {
    /// Queues a command. Returns `false` once the player is gone.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn toggle_playback(&self) -> bool {
        self.send(Command::TogglePlayback)
    }

    pub fn seek_to_fraction(&self, fraction: f64) -> bool {
        self.send(Command::SeekToFraction(fraction))
    }

    pub fn set_volume(&self, volume: f64) -> bool {
        self.send(Command::SetVolume(volume))
    }

    pub fn toggle_mute(&self) -> bool {
        self.send(Command::ToggleMute)
    }

    pub fn pointer_moved(&self) -> bool {
        self.send(Command::PointerMoved)
    }

    pub fn pointer_left(&self) -> bool {
        self.send(Command::PointerLeft)
    }

    /// Latest published state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Tears the player down and waits for the loop to finish.
    pub async fn unmount(self) {
        let PlayerHandle { commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(error = %err, "player task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{
        controller::tests::{Call, FakeElement, FakeSurface},
        state::Phase,
    };
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    struct Mounted {
        handle: PlayerHandle,
        media: mpsc::UnboundedSender<MediaEvent>,
        platform: broadcast::Sender<PlatformEvent>,
        ended: Arc<Mutex<u32>>,
    }

    fn mount(element: FakeElement) -> Mounted {
        let (media, media_rx) = mpsc::unbounded_channel();
        let (platform, platform_rx) = broadcast::channel(8);
        let ended = Arc::new(Mutex::new(0));
        let mut controller =
            TransportController::new(element, FakeSurface::supported(), "https://cdn.test/v.mp4");
        let counter = ended.clone();
        controller.on_ended(move || *counter.lock().unwrap() += 1);
        let handle = PlayerSession::new(controller, media_rx, platform_rx).spawn();
        Mounted {
            handle,
            media,
            platform,
            ended,
        }
    }

    async fn wait_for(handle: &PlayerHandle, check: impl FnMut(&PlaybackState) -> bool) {
        let mut rx = handle.subscribe();
        rx.wait_for(check).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pointer_hides_controls_while_playing() {
        let player = mount(FakeElement::default());
        player
            .media
            .send(MediaEvent::LoadedMetadata { duration: 60.0 })
            .unwrap();
        player.handle.toggle_playback();
        player.handle.pointer_moved();
        wait_for(&player.handle, |s| s.playing()).await;

        time::sleep(Duration::from_millis(2900)).await;
        assert!(player.handle.state().controls_visible);
        time::sleep(Duration::from_millis(200)).await;
        assert!(!player.handle.state().controls_visible);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_pointer_keeps_controls_while_paused() {
        let player = mount(FakeElement::default());
        player.handle.pointer_moved();
        time::sleep(Duration::from_millis(3500)).await;
        let state = player.handle.state();
        assert!(!state.playing());
        assert!(state.controls_visible);
    }

    #[tokio::test]
    async fn rejected_autoplay_settles_paused() {
        let mut element = FakeElement::default();
        element
            .play_results
            .push_back(Err(PlatformError::Rejected("autoplay".into())));
        let calls = element.calls.clone();
        let player = mount(element);
        player.handle.toggle_playback();

        let mut settled = false;
        for _ in 0..100 {
            let requested = calls.lock().unwrap().contains(&Call::Play);
            if requested && !player.handle.state().playing() {
                settled = true;
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert!(settled);
        assert_eq!(player.handle.state().phase, Phase::Loading);
    }

    #[tokio::test]
    async fn platform_and_media_events_flow_into_state() {
        let player = mount(FakeElement::default());
        player
            .platform
            .send(PlatformEvent::FullscreenChanged { active: true })
            .unwrap();
        wait_for(&player.handle, |s| s.fullscreen).await;

        player
            .media
            .send(MediaEvent::LoadedMetadata { duration: 8.0 })
            .unwrap();
        player.handle.toggle_playback();
        wait_for(&player.handle, |s| s.playing()).await;
        player.media.send(MediaEvent::Ended).unwrap();
        wait_for(&player.handle, |s| s.phase == Phase::Ended).await;
        assert_eq!(*player.ended.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn unmount_stops_the_loop() {
        let player = mount(FakeElement::default());
        let Mounted { handle, media, .. } = player;
        handle.unmount().await;
        assert!(media.send(MediaEvent::Ended).is_err());
    }
}
