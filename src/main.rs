#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use appmo_relay::api::MgmtState;
use appmo_relay::config::Config;
use appmo_relay::services::message_service::MessageService;
use appmo_relay::services::relay::RelayService;
use appmo_relay::storage::PgMessageStore;
use appmo_relay::{storage, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init_telemetry(&config.telemetry)?;

    appmo_relay::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_tx, shutdown_rx, gc_task) = async {
        // Infrastructure
        let pool = storage::init_pool(&config.database_url).await?;
        storage::run_migrations(&pool).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        appmo_relay::spawn_signal_handler(shutdown_tx.clone());

        // Component wiring
        let message_service = MessageService::new(Arc::new(PgMessageStore::new(pool)));
        let relay = RelayService::new(&config.websocket);
        let gc_task = relay.spawn_gc(config.websocket.room_gc_interval_secs, shutdown_rx.clone());

        // Listeners and routers
        let app_router = appmo_relay::api::app_router(
            config.clone(),
            message_service.clone(),
            relay,
            shutdown_rx.clone(),
        );
        let mgmt_app = appmo_relay::api::mgmt_router(MgmtState { message_service });

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((
            api_listener,
            mgmt_listener,
            app_router,
            mgmt_app,
            shutdown_tx,
            shutdown_rx,
            gc_task,
        ))
    }
    .instrument(boot_span)
    .await?;

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Graceful shutdown: stop the room GC and give it a bounded drain window.
    let _ = shutdown_tx.send(true);
    tokio::select! {
        _ = gc_task => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    Ok(())
}
