use actix_web::middleware::Compress;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use textql_agents::Text2SqlAgent;
use textql_api::config::ApiConfig;
use textql_api::helpers::{cors::build_cors, llm::create_llm_client};
use textql_api::state::AppState;
use textql_core::{connect_pool, PgBackend, QueryBackend, QueryExecutor, QueryPipeline};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let pool = connect_pool(&config.database.pool_settings())
        .await
        .context("DATABASE_URL must point at a reachable PostgreSQL database")?;

    let backend = Arc::new(PgBackend::new(pool));
    let executor = QueryExecutor::new(
        Arc::clone(&backend) as Arc<dyn QueryBackend>,
        config.query.executor_settings(),
    );
    let pipeline = QueryPipeline::new(executor);

    let llm_client = create_llm_client(&config.llm)?;
    let agent = Arc::new(Text2SqlAgent::new(
        llm_client,
        config.llm.agent_config(config.query.max_retries),
    ));

    let state = web::Data::new(AppState::new(agent, pipeline));
    let cors_config = config.cors.clone();
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting textql-api server at http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .wrap(build_cors(&cors_config))
            .app_data(state.clone())
            .configure(textql_api::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    backend.close().await;
    info!("Server stopped");
    Ok(())
}
