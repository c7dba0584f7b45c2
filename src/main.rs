//! FinSight signal engine — binary entrypoint.
//! Boots the store, the two scheduled jobs, and the read-only HTTP surface.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finsight_signals::analyze::gateway::{DynGateway, GroqGateway};
use finsight_signals::api::{create_router, AppState};
use finsight_signals::config::Settings;
use finsight_signals::ingest::providers::{
    finnhub::FinnhubProvider,
    newsapi::NewsApiProvider,
    social::{self, SocialProvider},
};
use finsight_signals::ingest::types::FeedProvider;
use finsight_signals::metrics::Metrics;
use finsight_signals::pipeline::Pipeline;
use finsight_signals::scheduler::{JobSupervisor, JobSupervisorCfg};
use finsight_signals::store::Store;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("finsight_signals=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    let metrics = Metrics::init();

    let store = Store::connect(&settings.database_url).await?;

    let mut providers: Vec<Box<dyn FeedProvider>> = Vec::new();
    if !settings.finnhub_api_key.is_empty() {
        providers.push(Box::new(FinnhubProvider::from_api_key(
            settings.finnhub_api_key.clone(),
        )));
    }
    if !settings.news_api_key.is_empty() {
        providers.push(Box::new(NewsApiProvider::from_api_key(
            settings.news_api_key.clone(),
        )));
    }
    if !settings.twitter_bearer_token.is_empty() {
        let influencers = social::parse_influencers(&settings.influencers);
        if influencers.is_empty() {
            tracing::warn!("TWITTER_BEARER_TOKEN set but X_INFLUENCERS is empty; social feed disabled");
        } else {
            providers.push(Box::new(SocialProvider::from_bearer_token(
                settings.twitter_bearer_token.clone(),
                influencers,
            )));
        }
    }
    if providers.is_empty() {
        tracing::warn!("no feed API keys configured; pipeline runs will ingest nothing");
    }

    let gateway: DynGateway = Arc::new(GroqGateway::new(settings.groq_api_key.clone(), None));
    let pipeline = Arc::new(Pipeline::new(
        providers,
        gateway,
        store.clone(),
        settings.min_credibility,
    ));

    let _supervisor = JobSupervisor::start(
        JobSupervisorCfg {
            pipeline_interval: settings.pipeline_interval,
            price_interval: settings.price_interval,
        },
        move || {
            let pipeline = pipeline.clone();
            async move { pipeline.run_once().await.map(|_| ()) }
        },
        || async {
            // Price quote retrieval lives outside this service; the slot
            // keeps the scheduler envelope intact.
            tracing::debug!("price refresh tick");
            Ok(())
        },
    );

    let app = create_router(AppState { store }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "http server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
