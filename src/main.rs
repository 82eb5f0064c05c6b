//! Postcache Server
//!
//! Serves cached post listings, row counts, health and metrics over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Postcache Server                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │    HTTP      │───▶│ PostService  │───▶│  Post Store  │       │
//! │  │   Routes     │    │ (two tiers)  │    │              │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::form_urlencoded;

use postcache::adapters::InMemoryPostRepository;
use postcache::cache::{InMemorySortedSetBackend, SharedListCache, SortedSetBackend};
use postcache::domain::{OrderMode, UserContext};
use postcache::error::{Error, Result};
use postcache::{monitoring, PostService, ServiceConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Postcache - two-tier post list cache server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum pages held by the local cache
    #[arg(long, env = "POSTCACHE_MAX_ENTRIES", default_value = "15")]
    max_entries: usize,

    /// Local cache time-to-live in seconds
    #[arg(long, env = "POSTCACHE_EXPIRE_SECONDS", default_value = "180")]
    expire_seconds: u64,

    /// Redis URL for the shared tier (in-memory when absent)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// HTTP bind address
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: String,

    /// Demo posts to seed the in-memory store with
    #[arg(long, env = "SEED_POSTS", default_value = "100")]
    seed_posts: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting postcache");
    info!("  Local max entries: {}", args.max_entries);
    info!("  Local expiry: {} seconds", args.expire_seconds);
    info!("  Seed posts: {}", args.seed_posts);

    let config = ServiceConfig::new(args.max_entries, args.expire_seconds);
    let repo = Arc::new(InMemoryPostRepository::seeded(args.seed_posts));
    let backend = shared_backend(args.redis_url.as_deref()).await?;
    let shared = Arc::new(SharedListCache::new(backend));

    let service = Arc::new(PostService::new(config, repo, shared)?);

    tokio::select! {
        result = run_http_server(&args.http_addr, service) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("Postcache shutdown complete");
    Ok(())
}

#[cfg(feature = "redis-store")]
async fn shared_backend(redis_url: Option<&str>) -> Result<Arc<dyn SortedSetBackend>> {
    match redis_url {
        Some(url) => Ok(Arc::new(
            postcache::adapters::RedisSortedSetBackend::connect(url).await?,
        )),
        None => {
            info!("No Redis URL given, using in-memory shared tier");
            Ok(Arc::new(InMemorySortedSetBackend::new()))
        }
    }
}

#[cfg(not(feature = "redis-store"))]
async fn shared_backend(redis_url: Option<&str>) -> Result<Arc<dyn SortedSetBackend>> {
    if redis_url.is_some() {
        tracing::warn!("Built without the redis-store feature, ignoring Redis URL");
    }
    Ok(Arc::new(InMemorySortedSetBackend::new()))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "redis=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

async fn run_http_server(addr: &str, service: Arc<PostService>) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid HTTP address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind HTTP server: {}", e)))?;

    info!("HTTP server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("HTTP server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let service = Arc::clone(&service);

        tokio::spawn(async move {
            let handler = service_fn(move |req| handle(Arc::clone(&service), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                error!("HTTP connection error: {}", e);
            }
        });
    }
}

async fn handle(
    service: Arc<PostService>,
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    drop(req);

    let response = match path.as_str() {
        "/healthz" | "/livez" | "/readyz" => text(StatusCode::OK, "ok"),
        "/metrics" => match monitoring::render_metrics(&service) {
            Ok(body) => with_content_type(
                Response::new(Full::new(Bytes::from(body))),
                monitoring::content_type(),
            ),
            Err(e) => failure(&e),
        },
        "/posts" => match ListQuery::parse(&query) {
            Ok(q) => match service
                .find_post_list(q.user, q.offset, q.limit, q.order)
                .await
            {
                Ok(posts) => json(&posts),
                Err(e) => failure(&e),
            },
            Err(e) => failure(&e),
        },
        "/posts/count" => match parse_user(&query) {
            Ok(user) => match service.find_post_row_count(user).await {
                Ok(rows) => json(&serde_json::json!({ "rows": rows })),
                Err(e) => failure(&e),
            },
            Err(e) => failure(&e),
        },
        _ => text(StatusCode::NOT_FOUND, "not found"),
    };
    Ok(response)
}

// =============================================================================
// Query Parsing
// =============================================================================

/// Parameters of `GET /posts`
#[derive(Debug, PartialEq)]
struct ListQuery {
    user: UserContext,
    offset: u32,
    limit: u32,
    order: OrderMode,
}

impl ListQuery {
    const DEFAULT_LIMIT: u32 = 10;

    fn parse(query: &str) -> Result<Self> {
        let mut q = ListQuery {
            user: UserContext::Anonymous,
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
            order: OrderMode::Hot,
        };
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let (name, value) = (&*name, &*value);
            match name {
                "offset" => q.offset = parse_number(name, value)?,
                "limit" => q.limit = parse_number(name, value)?,
                "user" => q.user = UserContext::from_id(parse_number(name, value)?),
                "order" => q.order = value.parse()?,
                _ => {}
            }
        }
        Ok(q)
    }
}

fn parse_user(query: &str) -> Result<UserContext> {
    match form_urlencoded::parse(query.as_bytes()).find(|(name, _)| name == "user") {
        Some((name, value)) => Ok(UserContext::from_id(parse_number(&name, &value)?)),
        None => Ok(UserContext::Anonymous),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{} must be a non-negative integer", name)))
}

// =============================================================================
// Responses
// =============================================================================

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

fn json<T: serde::Serialize>(value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(
            Response::new(Full::new(Bytes::from(body))),
            "application/json",
        ),
        Err(e) => failure(&Error::Internal(format!("response encoding failed: {}", e))),
    }
}

fn with_content_type(
    mut response: Response<Full<Bytes>>,
    content_type: &'static str,
) -> Response<Full<Bytes>> {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Caller mistakes are 400, data path failures are 503
fn failure(err: &Error) -> Response<Full<Bytes>> {
    let status = match err {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        e if e.is_contract_violation() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        error!("Request failed: {}", err);
    }
    let mut response = Response::new(Full::new(Bytes::from(err.to_string())));
    *response.status_mut() = status;
    response
}
