use anyhow::Context;
use tokio::net::TcpListener;

use bookchat_backend::config::Settings;
use bookchat_backend::logging;
use bookchat_backend::server::router;
use bookchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration errors are fatal before anything else starts.
    let settings = Settings::from_env().context("configuration error")?;
    logging::init(&settings.log_dir);

    let port = settings.port;
    let state = AppState::initialize(settings).await?;

    // Expensive setup runs in the background; the listener below accepts
    // connections immediately and /api/ask fails fast until ready.
    state.start_preload();

    let bind_addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("listening on {}", addr);

    let app = router::router(state);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
