use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courtrush::auth::{ProfileProvider, Session, SessionProfile};
use courtrush::booking::BookingEngine;
use courtrush::config::Config;
use courtrush::gate::SystemClock;
use courtrush::gateway::PlatformClient;
use courtrush::model::BookingRequest;
use courtrush::notify::NotifyHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    courtrush::observability::init(config.metrics_port)?;

    let client = Arc::new(PlatformClient::new(config.platform.clone())?);
    let profile = establish_session(&config, client.clone()).await?;

    let engine = BookingEngine::new(
        client,
        Arc::new(profile),
        Arc::new(SystemClock),
        Arc::new(NotifyHub::new()),
        config.cycle_settings(),
    );

    let request = BookingRequest::new(config.booking_date(Utc::now()), config.window.clone());
    info!("courtrush run {}", request.run_id);
    info!("  platform: {}", config.platform.base_url);
    info!("  space: {} sport: {}", config.space_id, config.sport_type);
    info!("  date: {} window: {}", request.date, request.window);
    info!(
        "  release: {}",
        config
            .release_at
            .map_or("immediate".to_string(), |t| format!("{t} Asia/Shanghai"))
    );

    // Progress goes to stdout; tracing keeps the detailed log on stderr.
    let mut progress = engine.notify.subscribe(request.run_id);
    let printer = tokio::spawn(async move {
        while let Ok(p) = progress.recv().await {
            println!("{p}");
        }
    });

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let result = engine.run_booking_cycle(&request, &cancel).await;
    let _ = printer.await;

    match result {
        Ok(booked) => {
            println!("{}", serde_json::to_string_pretty(&booked)?);
            Ok(())
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

/// Reuse a configured session, or log in by SMS code read from stdin.
async fn establish_session(
    config: &Config,
    client: Arc<PlatformClient>,
) -> Result<SessionProfile, Box<dyn std::error::Error>> {
    if let (Some(token), Some(user_id)) = (&config.token, &config.user_id) {
        info!("using configured session for user {user_id}");
        let session = Session {
            token: token.clone(),
            user_id: user_id.clone(),
        };
        return Ok(SessionProfile::new(client, session));
    }

    let Some(phone) = config.phone.as_deref() else {
        return Err("set COURTRUSH_TOKEN and COURTRUSH_USER_ID, or COURTRUSH_PHONE to log in".into());
    };
    client.send_sms_code(phone).await?;
    println!("SMS code sent to {phone}, enter it:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = lines.next_line().await?.unwrap_or_default();
    let code = code.trim();
    if code.is_empty() {
        return Err("no SMS code entered".into());
    }

    let profile = SessionProfile::login(client, phone, code, &config.open_id).await?;
    info!("logged in as user {}", profile.session().user_id);
    // Fail here rather than at release time if the account has no verified phone.
    profile.identity().await?;
    Ok(profile)
}

/// Cancel the run on ctrl-c or SIGTERM.
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, cancelling run");
    cancel.cancel();
}
