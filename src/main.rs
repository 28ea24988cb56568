use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use docket_bot::config::Config;
use docket_bot::external::{
    ConnectorRegistry, CourtListenerClient, MastodonConnector, ThumbnailClient,
};
use docket_bot::guard::IdempotencyGuard;
use docket_bot::pipeline::Pipeline;
use docket_bot::queue::{run_worker, JobQueue};
use docket_bot::server::{app, AppState};
use docket_bot::store::MemoryStore;
use docket_bot::types::{Channel, ChannelId, Service};
use docket_bot::webhooks::WebhookRouter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    if let Err(err) = run(config).await {
        error!(error = %err, "server exited");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), std::io::Error> {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(JobQueue::new());
    let guard = Arc::new(IdempotencyGuard::new());

    let mut connectors = ConnectorRegistry::new();
    match (&config.mastodon_base_url, &config.mastodon_access_token) {
        (Some(base_url), Some(token)) => {
            connectors.register(
                Service::Mastodon,
                Arc::new(MastodonConnector::new(base_url.clone(), token.clone())),
            );
            store.add_channel(Channel {
                id: ChannelId(1),
                service: Service::Mastodon,
                account: config.mastodon_account.clone(),
                enabled: true,
            });
            info!(account = %config.mastodon_account, "mastodon channel enabled");
        }
        _ => warn!("no posting connector configured; filings will not be posted"),
    }

    let documents = Arc::new(CourtListenerClient::new(
        config.courtlistener_base_url.clone(),
        config.courtlistener_token.clone(),
    ));
    let thumbnails = Arc::new(ThumbnailClient::new(config.thumbnail_base_url.clone()));

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        documents,
        thumbnails,
        Arc::new(connectors),
        queue.clone(),
        config.retry_spec(),
    ));
    tokio::spawn(run_worker(queue.clone(), pipeline));

    // Periodic cleanup of expired idempotency entries.
    tokio::spawn({
        let guard = guard.clone();
        async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                let pruned = guard.prune_expired();
                if pruned > 0 {
                    info!(pruned, "pruned idempotency entries");
                }
            }
        }
    });

    let router = WebhookRouter::new(
        store,
        queue.clone(),
        guard,
        config.router_options(),
    );
    let state = AppState::new(router, queue);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening for webhooks");
    axum::serve(listener, app(state)).await
}
