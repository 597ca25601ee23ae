//! Lotus - headless playback session
//!
//! Runs a playback session against the in-memory engine. Audio file paths
//! given on the command line form the library; the first one is opened as
//! soon as the engine binds and state changes are logged until interrupted.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Result,
    tokio::{signal::ctrl_c, sync::broadcast::error::RecvError, time::sleep},
    tracing::info,
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

use lotus::{
    InMemoryEngine, PlaybackStateEvent, PlayerSession, Track, error::ErrorReporter,
    library::MemoryLibrarySource,
};

/// Delay before the engine binds, mirroring a media service that connects
/// after the UI is up.
const ENGINE_CONNECT_DELAY: Duration = Duration::from_millis(250);

fn track_from_path(path: String) -> Track {
    let title = path
        .rsplit_once('/')
        .map_or(path.as_str(), |(_, name)| name)
        .to_string();
    Track {
        uri: format!("file://{path}"),
        title: Some(title),
        path,
        ..Track::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lotus=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tracks: Vec<Track> = std::env::args().skip(1).map(track_from_path).collect();
    let first_uri = tracks.first().map(|track| track.uri.clone());

    let source = Arc::new(MemoryLibrarySource::new(tracks));
    let session = Arc::new(PlayerSession::open_default(source).await?);
    session.start();
    session.watcher().refresh().await?;

    let mut events = session.store().subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PlaybackStateEvent::PositionChanged(_)) => {}
                Ok(event) => info!(?event, "Playback state changed"),
                Err(RecvError::Lagged(skipped)) => info!(skipped, "State log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Played once the engine is bound.
    if let Some(uri) = first_uri {
        session.open_uri(&uri);
    }

    let binder = session.clone();
    tokio::spawn(async move {
        sleep(ENGINE_CONNECT_DELAY).await;
        binder.attach_engine(Arc::new(InMemoryEngine::new()));
    });

    match session.restore().await {
        Ok(()) => info!("Playback session restored"),
        Err(e) => ErrorReporter::error(&anyhow::Error::new(e), "Restoring playback session"),
    }

    ctrl_c().await?;
    info!("Shutting down");
    session.shutdown().await;
    logger.abort();
    Ok(())
}
