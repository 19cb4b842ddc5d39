mod balance;
mod commands;
mod env;
mod notify;
mod state;

use std::net::SocketAddr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use indoc::formatdoc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::log;

use self::{
    balance::{BalanceClient, BalanceSource, TokenBalance},
    commands::{CommandPoller, InboundCommand},
    env::APP_CONFIG,
    notify::{MessageSink, Notifier},
    state::MonitorState,
};

/// Upper bound on any single outbound call. The loop is single-threaded, a
/// hung request with no timeout would stall commands, sampling and alerts
/// alike.
pub(crate) const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Sleep between cycles. Bounds command responsiveness, not sampling.
const CYCLE_SLEEP: std::time::Duration = std::time::Duration::from_secs(2);

const BALANCE_UNAVAILABLE_REPLY: &str = "⚠️ could not fetch the balance, try again later";

fn format_balance_reply(balance: TokenBalance, symbol: &str) -> String {
    format!("💰 current balance: {balance} {symbol}")
}

fn format_alert(balance: TokenBalance, threshold: f64, symbol: &str) -> String {
    formatdoc!(
        "
        🚨 balance below threshold
        current: {balance} {symbol}
        threshold: {threshold} {symbol}"
    )
}

fn format_summary(balance: TokenBalance, symbol: &str) -> String {
    format!("⏱ balance: {balance} {symbol}")
}

/// Alerts and summaries go to the primary chat and, when configured, the
/// broadcast group.
fn default_destinations() -> Vec<&'static str> {
    let mut destinations = vec![APP_CONFIG.telegram_chat_id.as_str()];
    if let Some(group) = &APP_CONFIG.telegram_group_id {
        destinations.push(group.as_str());
    }
    destinations
}

/// Runs a recognized inbound command at most once. The processed check
/// happens before any side effect; the key is recorded even when the sample
/// fails, the command itself has been handled.
async fn dispatch_command(
    sampler: &impl BalanceSource,
    sink: &impl MessageSink,
    state: &mut MonitorState,
    command: &InboundCommand,
) {
    if !command.is_balance_request() {
        return;
    }

    let key = command.dedup_key();
    if state.is_processed(&key) {
        debug!(key, "skipping already processed command");
        return;
    }

    let chat_id = command.chat_id.to_string();
    match sampler.sample().await {
        Ok(balance) => {
            let reply = format_balance_reply(balance, &APP_CONFIG.token_symbol);
            notify::notify_reply(sink, &chat_id, &reply).await;
        }
        Err(err) => {
            warn!(%err, %chat_id, "balance query for command failed");
            notify::notify_reply(sink, &chat_id, BALANCE_UNAVAILABLE_REPLY).await;
        }
    }
    state.record_processed(key);
}

/// Threshold and summary checks for one successful sample. The alert has no
/// cooldown, it re-fires on every low sample by design.
async fn evaluate_sample(
    sink: &impl MessageSink,
    state: &mut MonitorState,
    balance: TokenBalance,
    now: DateTime<Utc>,
) {
    info!(%balance, "balance sample");

    if balance.is_below(APP_CONFIG.balance_threshold) {
        warn!(
            %balance,
            threshold = APP_CONFIG.balance_threshold,
            "balance below threshold"
        );
        let alert = format_alert(balance, APP_CONFIG.balance_threshold, &APP_CONFIG.token_symbol);
        notify::fan_out(sink, &default_destinations(), &alert).await;
    }

    if state.summary_due(now, APP_CONFIG.summary_interval()) {
        state.mark_summarized(now);
        let summary = format_summary(balance, &APP_CONFIG.token_symbol);
        notify::fan_out(sink, &default_destinations(), &summary).await;
    }
}

async fn run_monitor_loop() -> Result<()> {
    let poller = CommandPoller::new()?;
    let sampler = BalanceClient::new()?;
    let notifier = Notifier::new()?;
    let mut state = MonitorState::new();

    info!(
        wallet = %APP_CONFIG.wallet_address,
        contract = %APP_CONFIG.token_contract,
        threshold = APP_CONFIG.balance_threshold,
        "monitoring token balance"
    );

    loop {
        match poller.poll(state.cursor()).await {
            Ok(Some(poll)) => {
                state.advance_cursor(poll.cursor);
                if let Some(command) = poll.command {
                    dispatch_command(&sampler, &notifier, &mut state, &command).await;
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, "command poll failed, retrying next cycle"),
        }

        let now = Utc::now();
        if state.sampling_due(now, APP_CONFIG.sampling_interval()) {
            // Failures count as attempts, no tight retry against a broken
            // endpoint.
            state.mark_sampled(now);
            match sampler.sample().await {
                Ok(balance) => evaluate_sample(&notifier, &mut state, balance, now).await,
                Err(err) => warn!(%err, "balance query failed, retrying next interval"),
            }
        }

        sleep(CYCLE_SLEEP).await;
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Liveness route for the host platform. Shares no state with the monitor.
async fn mount_health_route(port: u16) -> Result<()> {
    use axum::{routing::get, Router};

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new().route("/", get(health).post(health));

    info!("health route listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(Into::into)
}

pub async fn start_monitor() -> Result<()> {
    log::init();

    match APP_CONFIG.port {
        Some(port) => {
            tokio::try_join!(mount_health_route(port), run_monitor_loop())?;
            Ok(())
        }
        None => run_monitor_loop().await,
    }
}
