//! Livetable - Main entry point
//!
//! Mirrors a remote item table in the terminal: seeds it from the snapshot
//! API, then re-renders it on every change pushed over the stream.

use anyhow::Context;
use livetable_client::config::ENV_TOKEN;
use livetable_client::{
    CredentialProvider, EnvCredential, Handlers, HttpSnapshotSource, SessionConfig,
    SnapshotSource, StaticSnapshot, SyncSession, TransportConfig,
};
use tracing_subscriber::EnvFilter;

mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("livetable=info,livetable_client=info")),
        )
        .init();

    let transport = TransportConfig::from_env().context("invalid transport settings")?;
    let settings = SessionConfig::from_env().context("invalid session settings")?;
    let token = EnvCredential::new(ENV_TOKEN);

    let source: Box<dyn SnapshotSource> = match &settings.api_url {
        Some(url) => Box::new(HttpSnapshotSource::new(url.clone()).with_token(token.credential())),
        None => {
            tracing::warn!("no snapshot API configured, starting from an empty table");
            Box::new(StaticSnapshot::default())
        }
    };

    let mut builder = SyncSession::builder(transport)
        .reducer(settings.reducer)
        .handlers(Handlers::new().on_decode_error(|err| {
            tracing::warn!("ignored malformed change event: {}", err);
        }));
    if token.credential().is_some() {
        builder = builder.credentials(token);
    }

    let session = builder
        .start(source.as_ref(), &settings.identity)
        .await
        .context("failed to start sync session")?;

    let mut items = session.subscribe();
    let mut states = session.state_changes();
    print!("{}", render::table(&session.current()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = items.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = items.borrow_and_update().clone();
                print!("{}", render::table(&current));
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                println!("{}", render::status(&state));
            }
        }
    }

    session.close();
    session.stopped().await;
    tracing::info!(
        "stopped after {} events ({:?})",
        session.events_applied(),
        session.stats()
    );
    Ok(())
}
