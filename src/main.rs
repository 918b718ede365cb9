use post_sweeper::config::AppConfig;
use post_sweeper::routes::{AppState, app_routes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("  export CLIENT_ID=... CALLBACK_URL=... JWT_KEY=...");
        std::process::exit(1);
    });

    eprintln!("🧹 Post Sweeper v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Platform API: {}", config.api_base_url);
    eprintln!("   Callback: {}", config.callback_url);
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);

    let app = app_routes(AppState::from_config(&config)?);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
