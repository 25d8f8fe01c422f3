use std::sync::Arc;

use anyhow::Context;
use bili_login::api::{ApiServer, ApiServerConfig, AppState};
use bili_login::config::AppConfig;
use bili_login::credentials::{Credentials, JsonFileCredentialStore};
use bili_login::logging::init_logging;
use bili_login::login::{LoginEvent, LoginService};
use bilibili_api::BiliClient;
use bilibili_api::credentials::PRIORITY_COOKIES;
use mimalloc::MiMalloc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let config = AppConfig::from_env_or_default();
    info!(
        cookie_file = %config.cookie_file.display(),
        "Starting bili-login {}",
        env!("CARGO_PKG_VERSION")
    );

    let client = BiliClient::new(config.client.clone()).context("building HTTP client")?;
    let store = JsonFileCredentialStore::new(&config.cookie_file);
    let login = Arc::new(LoginService::new(Arc::new(client), Arc::new(store)));
    let mut events = login.subscribe();

    let cancel_token = CancellationToken::new();
    let sweeper = login.spawn_expiry_sweeper(config.sweep_interval, cancel_token.child_token());

    let server = ApiServer::new(ApiServerConfig::from(&config), AppState::new(login.clone()))
        .with_cancel_token(cancel_token.child_token());
    let mut server_task = tokio::spawn(async move { server.run().await });

    println!("Open {} in a browser and scan the QR code", config.listen_url());

    let mut server_result = None;
    let completed = tokio::select! {
        key = wait_for_login(&mut events) => key,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            None
        }
        res = &mut server_task => {
            server_result = Some(res);
            None
        }
    };

    if let Some(key) = completed {
        match login.consume(&key) {
            Some(credentials) => print_summary(&credentials, &config),
            None => warn!(qrcode_key = %key, "Completed session was already consumed"),
        }
    }

    cancel_token.cancel();
    let _ = sweeper.await;
    let server_result = match server_result {
        Some(res) => res,
        None => server_task.await,
    };
    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Login server failed"),
        Err(e) => error!(error = %e, "Login server task panicked"),
    }

    Ok(())
}

/// Wait for the first session that completes a login.
async fn wait_for_login(
    events: &mut tokio::sync::broadcast::Receiver<LoginEvent>,
) -> Option<String> {
    loop {
        match events.recv().await {
            Ok(LoginEvent::Completed { key, .. }) => return Some(key),
            Ok(LoginEvent::Expired { .. } | LoginEvent::Dropped { .. }) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed login events");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

fn print_summary(credentials: &Credentials, config: &AppConfig) {
    println!("Login succeeded; credentials saved to {}", config.cookie_file.display());
    for name in PRIORITY_COOKIES {
        let state = if credentials.get(name).is_some() {
            "present"
        } else {
            "missing"
        };
        println!("  {name}: {state}");
    }
    if credentials.refresh_token().is_some() {
        println!("  refresh_token: present");
    }
}
