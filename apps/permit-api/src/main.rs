//! Permit API Server
//!
//! Turns an uploaded permit PDF into a plain-language questionnaire and
//! returns the filled document once the questions are answered.
//!
//! - `POST /upload-permit` - ingest, field extraction, question synthesis
//! - `GET /session/:id`, `GET /sessions` - session state
//! - `POST /save-answer` - record one answer and advance
//! - `POST /complete-permit` - fill the PDF with the answers
//! - `DELETE /session/:id` - remove a session and its fields
//!
//! Every route except `/health` requires a Supabase bearer token.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use clap::Parser;
use permit_core::clients::{AnthropicClient, PdfCoClient, SupabaseClient};
use permit_core::PermitPipeline;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod error;
mod handlers;
mod models;
mod state;

use config::Args;
use state::AppState;

/// Allowance for multipart boundaries and part headers on top of the file cap
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the router with every route and the body limit applied.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let body_limit = state.pipeline.config().max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Intake
        .route("/upload-permit", post(handlers::upload_permit))
        // Sessions
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/session/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        // Questionnaire
        .route("/save-answer", post(handlers::save_answer))
        .route("/complete-permit", post(handlers::complete_permit))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are set
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("permit_api={}", level).parse()?)
                .add_directive(format!("permit_core={}", level).parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose)?;

    info!("Starting permit API on {}:{}", args.host, args.port);

    let timeout = args.http_timeout();
    let supabase = Arc::new(
        SupabaseClient::new(
            &args.supabase_url,
            args.supabase_service_key.clone(),
            args.storage_bucket.clone(),
            timeout,
        )
        .context("Failed to build Supabase client")?,
    );
    let pdfco = PdfCoClient::new(args.pdfco_api_key.clone(), timeout)
        .context("Failed to build PDF.co client")?;
    let anthropic = AnthropicClient::new(
        args.anthropic_api_key.clone(),
        args.anthropic_model.clone(),
        timeout,
    )
    .context("Failed to build Anthropic client")?;

    let pipeline = PermitPipeline::new(
        supabase.clone(),
        Arc::new(pdfco),
        Arc::new(anthropic),
        args.pipeline_config(),
    );
    let state = AppState::new(pipeline, supabase);

    let app = build_router(state, cors_layer(&args.origins())?);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Jurisdiction: {}", args.jurisdiction);
    info!("Model: {}", args.anthropic_model);

    axum::serve(listener, app).await?;

    Ok(())
}
