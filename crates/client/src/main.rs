//! SurveilX Monitor - headless terminal client
//!
//! Holds a session open, prints connection changes, exit confirmations and
//! security alerts, and answers prompts from stdin.

use anyhow::Context;
use surveilx_client::{
    logging, ConfirmationOutcome, ConnectionManager, ConnectionState, NotificationSink,
    PendingConfirmation, SecurityAlert, Session, SessionConfig, TerminalBell, TokenStore,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands: y | n (answer prompt), r (reconnect), a (list alerts), \
d <n> (dismiss alert n), logout, q (quit)";

/// Prints to stdout for the operator.
struct Console;

impl NotificationSink for Console {
    fn connection_state(&self, state: ConnectionState) {
        println!("[{state}]");
    }

    fn confirmation_requested(&self, pending: &PendingConfirmation) {
        println!();
        println!("EXIT CONFIRMATION: {}", pending.message);
        if let Some(plate) = &pending.plate_number {
            println!("  plate:   {plate}");
        }
        if let Some(vehicle) = &pending.vehicle_name {
            println!("  vehicle: {vehicle}");
        }
        println!(
            "  answer y/n before {}",
            pending.expires_at.format("%H:%M:%S")
        );
    }

    fn confirmation_closed(&self, _pending_id: &str, outcome: ConfirmationOutcome) {
        match outcome {
            ConfirmationOutcome::Expired => println!("exit confirmation expired"),
            ConfirmationOutcome::Superseded => println!("exit confirmation replaced"),
            _ => {}
        }
    }

    fn security_alert(&self, alert: &SecurityAlert) {
        println!("SECURITY ALERT: {}", alert.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = SessionConfig::from_env();
    tracing::info!(ws_url = %config.ws_url, "starting monitor");

    let manager = ConnectionManager::builder(config)
        .notification_sink(Console)
        .audio_cue(TerminalBell)
        .spawn();
    let session = Session::new(manager);

    let store = match TokenStore::default_location() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!(error = %e, "token store unavailable");
            None
        }
    };

    match (std::env::var("SURVEILX_TOKEN").ok(), &store) {
        (Some(token), _) => session.set_token(Some(token))?,
        (None, Some(store)) => {
            session.follow(store.watch());
        }
        (None, None) => {}
    }
    if session.token().is_none() && store.as_ref().and_then(TokenStore::load).is_none() {
        println!("no token: set SURVEILX_TOKEN or log in first");
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("y"), _) => answer(&session, true).await,
            (Some("n"), _) => answer(&session, false).await,
            (Some("r"), _) => session.reconnect()?,
            (Some("a"), _) => list_alerts(&session),
            (Some("d"), Some(n)) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => session.dismiss_alert_at(n - 1)?,
                _ => println!("usage: d <n>, with n from the alert list"),
            },
            (Some("logout"), _) => logout(&session, store.as_ref())?,
            (Some("q"), _) => break,
            _ => println!("{HELP}"),
        }
    }

    session.shutdown()?;
    session.manager().closed().await;
    Ok(())
}

/// Drop the live token and the stored one. A token from `SURVEILX_TOKEN`
/// never passes through the store, so clearing the store alone is not enough.
fn logout(session: &Session, store: Option<&TokenStore>) -> anyhow::Result<()> {
    session.logout()?;
    if let Some(store) = store {
        store.clear().context("clearing stored token")?;
    }
    Ok(())
}

async fn answer(session: &Session, confirmed: bool) {
    if let Err(e) = session.respond(confirmed).await {
        println!("cannot answer: {e}");
    }
}

fn list_alerts(session: &Session) {
    let alerts = session.security_alerts();
    if alerts.is_empty() {
        println!("no alerts");
        return;
    }
    for (i, alert) in alerts.iter().enumerate() {
        println!(
            "{:>3}. [{}] {}",
            i + 1,
            alert.received_at.format("%H:%M:%S"),
            alert.message
        );
    }
}
