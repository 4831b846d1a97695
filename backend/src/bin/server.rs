use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::db::{self, services::TaskService};
use newsdesk::pipeline::{ArticleGenerator, ChatCompletionClient, FeedFetcher, Pricing};
use newsdesk::server::config::ServerConfig;
use newsdesk::server::scheduler::TaskScheduler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info,sea_orm=warn` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting newsdesk server.");

    // --- Database Setup ---
    let db_pool = db::connect(&server_config.database_url).await?;
    db::create_schema(&db_pool).await?;
    match TaskService::reset_running(&db_pool).await {
        Ok(0) => {}
        Ok(count) => warn!(count, "Reset tasks left running by a previous process."),
        Err(e) => error!(error = %e, "Failed to reset running tasks."),
    }

    // --- Pipeline Setup ---
    let rewriter = Arc::new(ChatCompletionClient::new(
        server_config.llm_api_url.clone(),
        server_config.llm_api_key.clone(),
        server_config.llm_model.clone(),
    ));
    let pricing = Pricing {
        input_per_million: server_config.llm_input_cost_per_million,
        output_per_million: server_config.llm_output_cost_per_million,
    };
    let generator = Arc::new(ArticleGenerator::new(
        db_pool.clone(),
        rewriter,
        FeedFetcher::new(),
        pricing,
    ));

    // --- Task Scheduler ---
    if server_config.scheduler_enabled {
        let scheduler = Arc::new(TaskScheduler::new(db_pool.clone(), generator.clone()));
        let period = server_config.scheduler_interval_secs;
        tokio::spawn(async move {
            scheduler.start_periodic(period).await;
        });
    } else {
        info!("Task scheduler disabled by configuration.");
    }

    // --- Axum HTTP Server Setup ---
    let app = newsdesk::web::create_axum_router(db_pool, server_config.clone(), generator);

    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(Box::new)?;

    Ok(())
}
