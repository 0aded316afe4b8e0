use std::net::SocketAddr;

use trekly_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trekly_observability::init();

    let config = Config::from_env();
    let addr = format!("0.0.0.0:{}", config.port);

    let app = trekly_api::app::build_app(config);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
