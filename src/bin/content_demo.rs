//! Content demo: a local source polled into an artifact
//!
//! Serves a small JSON content document over HTTP with a `Modified-At`
//! header, registers a `Content` artifact against it, and logs a line every
//! time a refresh cycle picks up a change.

use anyhow::Result;
use artifact_sync::{Artifact, ArtifactCell, Notifier, Poller};
use axum::http::HeaderName;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "content-demo")]
#[command(about = "Poll a local content endpoint into an artifact")]
struct Cli {
    /// Port for the demo content server
    #[arg(long, default_value = "18791")]
    port: u16,

    /// Seconds between refresh cycles
    #[arg(long, default_value = "10")]
    interval: u64,
}

/// News-style content artifact
#[derive(Default)]
struct Content {
    notifier: Notifier,
    headlines: Vec<String>,
    links: Vec<String>,
}

#[derive(Deserialize)]
struct ContentDoc {
    headlines: Vec<String>,
    links: Vec<String>,
}

impl Artifact for Content {
    fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    fn update(&mut self, body: &[u8]) -> artifact_sync::Result<()> {
        let doc: ContentDoc = serde_json::from_slice(body)?;
        self.headlines = doc.headlines;
        self.links = doc.links;
        Ok(())
    }
}

/// Stand-in for a remote content source; stamps every response as modified now
async fn serve_content() -> impl IntoResponse {
    let body = serde_json::json!({
        "headlines": ["Food is great", "Pineapple on pizza is still up for debate"],
        "links": ["#/ref/potato", "#/ref/pizza"],
    });

    (
        [(HeaderName::from_static("modified-at"), Utc::now().to_rfc3339())],
        body.to_string(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_demo=info,artifact_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = Router::new().route("/headlines", get(serve_content));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", cli.port)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("content server failed: {}", err);
        }
    });
    tracing::info!(%addr, "content server listening");

    let poller = Arc::new(
        Poller::builder(format!("http://{}", addr))
            .interval(Duration::from_secs(cli.interval))
            .build()?,
    );

    let cancel = CancellationToken::new();
    let monitor = {
        let poller = poller.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.monitor_updates(cancel).await })
    };

    let content = ArtifactCell::new(Content::default());
    poller.register("headlines", &content).await?;

    let (tx, mut rx) = mpsc::channel(1);
    content.register(tx).await?;

    let reader = {
        let content = content.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let guard = content.read().await;
                tracing::info!(
                    headlines = guard.headlines.len(),
                    links = guard.links.len(),
                    "content updated"
                );
            }
        })
    };

    tracing::info!("content demo running, ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    cancel.cancel();
    monitor.await?;
    reader.abort();

    tracing::info!("content demo stopped");
    Ok(())
}
