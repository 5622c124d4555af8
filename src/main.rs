use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio_stream::wrappers::WatchStream;
use url::Url;

use zashboard::backend::hass::auth::TokenAuth;
use zashboard::backend::hass::frame::PageContext;
use zashboard::backend::hass::{ConnectionStatus, HassSession, WsConnection};
use zashboard::config::{self, AppConfig};
use zashboard::error::{ApiError, ApiResult};
use zashboard::server;
use zashboard::server::appstate::AppState;
use zashboard::server::http::{HttpServer, signal_stop};
use zashboard_api::Client;
use zashboard_api::store::DashboardState;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Optional configuration file (environment variables override it)
    #[arg(short, long, default_value = "zashboard.yaml")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the dashboard server (default)
    Serve,

    /// Connect to Home Assistant and follow entity updates
    States {
        /// Address the dashboard page would be opened at
        #[arg(long)]
        page_url: Url,
    },

    /// Call a Home Assistant service
    Call {
        domain: String,
        service: String,

        #[arg(long)]
        entity: Option<String>,
    },

    /// Show the rooms of a running dashboard server
    Rooms {
        #[arg(long, default_value = "http://localhost:8099/")]
        server: Url,
    },
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "tower_http::trace::on_request=info",
        "tungstenite=info",
        "tokio_tungstenite=info",
        "hyper_util=info",
        "reqwest=info",
        "axum::rejection=trace",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn install_signal_handlers(server: &HttpServer) -> ApiResult<()> {
    fn shutdown(msg: &str, handle: &axum_server::Handle) {
        log::warn!("{msg}");
        let _ = std::io::stderr().flush();
        signal_stop(handle);
    }

    let handle = server.handle();
    tokio::spawn(async move {
        if matches!(signal::ctrl_c().await, Ok(())) {
            shutdown("Ctrl-C pressed, exiting..", &handle);
        }
    });

    let handle = server.handle();
    let mut signal = signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if matches!(signal.recv().await, Some(())) {
            shutdown("SIGTERM received, exiting..", &handle);
        }
    });

    Ok(())
}

async fn serve(config: AppConfig) -> ApiResult<()> {
    #[cfg(feature = "server-banner")]
    server::banner::print()?;

    if config.hass_token.is_none() {
        log::info!("No HASS_TOKEN configured; the web UI will use the Home Assistant session it runs in");
    }

    let http = HttpServer::http(config.bind_address, config.port);
    let appstate = AppState::from_config(config)?;

    install_signal_handlers(&http)?;

    http.run(server::build_service(appstate)).await
}

async fn connect(config: &AppConfig, page_url: Url) -> ApiResult<HassSession<WsConnection>> {
    let session = HassSession::new();
    let auth = TokenAuth::from_config(config);

    session.init(&PageContext::top_level(page_url), &auth).await;

    if session.status() == ConnectionStatus::Error {
        return Err(ApiError::service_error(session.error().unwrap_or_default()));
    }

    Ok(session)
}

async fn follow_states(config: &AppConfig, page_url: Url) -> ApiResult<()> {
    let session = connect(config, page_url).await?;

    let mut status = WatchStream::new(session.subscribe_status());
    let mut states = WatchStream::new(session.subscribe_states());

    loop {
        tokio::select! {
            Some(st) = status.next() => {
                log::info!("Connection status: {st}");
                if st == ConnectionStatus::Disconnected {
                    break;
                }
            }
            Some(entities) = states.next() => {
                log::info!("Received snapshot of {} entities", entities.len());
            }
            else => break,
        }
    }

    Ok(())
}

async fn call(
    config: &AppConfig,
    domain: &str,
    service: &str,
    entity: Option<String>,
) -> ApiResult<()> {
    let page_url = config
        .hass_url
        .clone()
        .ok_or_else(|| ApiError::service_error("HASS_URL is not configured".to_string()))?;
    let session = connect(config, page_url).await?;

    let mut data = Map::new();
    if let Some(entity) = entity {
        data.insert("entity_id".to_string(), Value::String(entity));
    }

    match session.call_service(domain, service, data).await? {
        Some(res) => log::info!("Called {domain}.{service}: {res}"),
        None => log::warn!("Service {domain}.{service} was not called"),
    }

    Ok(())
}

async fn show_rooms(server: &Url) -> ApiResult<()> {
    let client = Client::from_server(server)?;
    let state = DashboardState::new(Arc::new(client));
    state.load().await;

    let sidebar = state.sidebar();
    log::info!("{}", sidebar.title);

    let active = state.active_room_id();
    for room in state.rooms() {
        let marker = if active.as_deref() == Some(room.id.as_str()) {
            "*"
        } else {
            " "
        };
        log::info!(
            "{marker} {} ({}): {} object(s)",
            room.title,
            room.id,
            room.objects.len()
        );
    }

    Ok(())
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let cli = Cli::parse();

    let config = config::parse(&cli.config)?;
    log::debug!("Configuration loaded successfully");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::States { page_url } => follow_states(&config, page_url).await,
        Command::Call {
            domain,
            service,
            entity,
        } => call(&config, &domain, &service, entity).await,
        Command::Rooms { server } => show_rooms(&server).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Zashboard error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
