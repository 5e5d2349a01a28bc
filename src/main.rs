use clap::Parser; // for cli
use image_gateway::config::Args;
use image_gateway::rate_limit::quota_sweeper;
use image_gateway::state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("image_gateway=info,tower_http=info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    let state = Arc::new(AppState::from_args(&args)?);

    // spawn the quota sweeper
    let store = Arc::clone(state.gateway.store());
    let sweep_every = args.sweep_interval();
    let sweep_grace = args.sweep_grace;
    tokio::spawn(async move {
        quota_sweeper(store, sweep_every, sweep_grace).await;
    });

    let app = image_gateway::create_app(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, "Image gateway listening");
    info!(upstream = %args.upstream_url, "Forwarding image requests");
    info!(
        window_secs = args.rate_window,
        image_auth = args.image_limit_auth,
        image_anon = args.image_limit_anon,
        generic_auth = args.generic_limit_auth,
        generic_anon = args.generic_limit_anon,
        "Quota tiers"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
