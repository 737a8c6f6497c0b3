//! Logs in to a Petrodesk API and prints the session monitor's view as it
//! changes, until the session ends or Ctrl-C.
//!
//! ```text
//! PETRODESK_API_BASE=https://erp.example.com/api/ \
//! PETRODESK_EMAIL=ops@example.com PETRODESK_PASSWORD=... \
//! PETRODESK_COMPANY_ID=1 RUST_LOG=petrodesk_monitor=debug \
//!     cargo run -p session-probe
//! ```
//!
//! If the account has MFA on, the code is read from stdin.

use std::sync::Arc;

use petrodesk::prelude::*;

struct Settings {
    api_base: url::Url,
    email: Option<String>,
    password: Option<String>,
    company_id: CompanyId,
}

impl Settings {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let raw_base = lookup("PETRODESK_API_BASE").ok_or("PETRODESK_API_BASE is not set")?;
        let api_base =
            url::Url::parse(&raw_base).map_err(|e| format!("PETRODESK_API_BASE: {e}"))?;
        let company_id = match lookup("PETRODESK_COMPANY_ID") {
            Some(raw) => raw
                .trim()
                .parse()
                .map(CompanyId)
                .map_err(|e| format!("PETRODESK_COMPANY_ID: {e}"))?,
            None => CompanyId(1),
        };
        Ok(Self {
            api_base,
            email: lookup("PETRODESK_EMAIL"),
            password: lookup("PETRODESK_PASSWORD"),
            company_id,
        })
    }
}

fn read_mfa_code() -> std::io::Result<String> {
    eprint!("MFA code: ");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    petrodesk::init_tracing();
    let settings = Settings::from_lookup(|key| std::env::var(key).ok())?;

    let (host, mut terminated) = ChannelHost::new();
    let client = SessionClient::builder(settings.api_base)
        .host(Arc::new(host))
        .connect()
        .await?;

    if client.user().is_none() {
        let (Some(email), Some(password)) = (&settings.email, &settings.password) else {
            return Err("no session; set PETRODESK_EMAIL and PETRODESK_PASSWORD".into());
        };
        match client.auth().login(email, password, settings.company_id).await? {
            LoginOutcome::Authenticated(user) => tracing::info!(user_id = %user.id, "logged in"),
            LoginOutcome::MfaRequired(challenge) => {
                let code = read_mfa_code()?;
                let user = client
                    .auth()
                    .verify_mfa(challenge.user_id, challenge.company_id, &code, false)
                    .await?;
                tracing::info!(user_id = %user.id, "logged in with MFA");
            }
        }
    }

    let mut views = client.monitor().subscribe();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                println!(
                    "{:<12} remaining={:?} timeout={:?} warning={} dismissed={}",
                    view.phase.to_string(),
                    view.remaining_minutes,
                    view.timeout_minutes,
                    view.show_warning,
                    view.warning_dismissed,
                );
            }
            Some(event) = terminated.recv() => {
                println!("session ended ({}), redirect to {}", event.reason, event.login_route);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                client.auth().logout().await;
                break;
            }
        }
    }

    client.shutdown().await.ok();
    Ok(())
}
