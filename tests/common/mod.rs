#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use mediasync::player::{BackendFactory, Playlist, ViewSync};
use mediasync::player::{PlayerController, PlayerHandle, PlayerSetup, PlayerSnapshot};
use mediasync::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub use mocks::{FakeElementProvider, FakeVimeoProvider, FakeYouTubeProvider, RecordingView};

/// A running controller wired to fake drivers
pub struct TestPlayer {
    pub handle: PlayerHandle,
    pub task: JoinHandle<()>,
    pub native: Arc<FakeElementProvider>,
    pub youtube: Arc<FakeYouTubeProvider>,
    pub vimeo: Arc<FakeVimeoProvider>,
    pub view: Arc<RecordingView>,
}

impl TestPlayer {
    pub fn spawn(config: Config, playlist: Playlist) -> Self {
        Self::spawn_with(config, playlist, Arc::new(FakeElementProvider::new()))
    }

    pub fn spawn_with(config: Config, playlist: Playlist, native: Arc<FakeElementProvider>) -> Self {
        Self::spawn_with_drivers(config, playlist, native, Arc::new(FakeYouTubeProvider::new()))
    }

    pub fn spawn_with_drivers(
        config: Config,
        playlist: Playlist,
        native: Arc<FakeElementProvider>,
        youtube: Arc<FakeYouTubeProvider>,
    ) -> Self {
        let vimeo = Arc::new(FakeVimeoProvider::new());
        let view = Arc::new(RecordingView::new());

        let factory = BackendFactory::new()
            .with_native(native.clone())
            .with_youtube(youtube.clone())
            .with_vimeo(vimeo.clone());
        let (handle, task) = PlayerController::spawn(PlayerSetup {
            config,
            playlist: Some(playlist),
            factory,
            view: view.clone() as Arc<dyn ViewSync>,
        })
        .expect("Failed to spawn player controller");

        Self {
            handle,
            task,
            native,
            youtube,
            vimeo,
            view,
        }
    }

    /// Poll the controller until `condition` holds for its snapshot
    pub async fn wait_for_snapshot<F>(&self, condition: F) -> PlayerSnapshot
    where
        F: Fn(&PlayerSnapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = self.handle.snapshot().await.expect("Controller stopped");
            if condition(&snapshot) {
                return snapshot;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "Condition not met, last snapshot: {:?}",
                snapshot
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await.expect("Failed to shut down");
        self.task.await.expect("Controller task panicked");
    }
}

/// Wait until `condition` returns true or the timeout elapses
pub async fn wait_for_async<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Let the controller drain whatever is queued
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
