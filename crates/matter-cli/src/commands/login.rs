//! Login command handler
//!
//! Pairs this vault with a Matter account: the API issues a session token,
//! the user confirms it in the Matter app, and we poll until tokens arrive.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use matter_core::sync::{MatterClient, StateStore, TokenPair};
use matter_core::vault;
use matter_core::Config;

use super::state_store;
use crate::output::{Output, OutputFormat};

/// Exchange attempts before giving up (one per second)
const LOGIN_ATTEMPTS: u32 = 600;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pair with Matter and store the tokens
pub async fn login(config: &Config, data_dir: Option<String>, output: &Output) -> Result<()> {
    let client = MatterClient::with_host(&config.api_host)
        .context("Failed to create Matter API client")?;
    let store = state_store(config);

    let session_token = client
        .qr_login_trigger()
        .await
        .context("Failed to start Matter login")?;

    let mut state = store.load().await.context("Failed to load sync state")?;
    state.qr_session_token = Some(session_token.clone());
    if let Some(dir) = data_dir {
        state.data_dir = vault::normalize_path(&dir);
    }
    store.save(&state).await.context("Failed to save sync state")?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "session_token": session_token }));
        }
        OutputFormat::Quiet => println!("{}", session_token),
        OutputFormat::Human => {
            println!("Confirm this session in the Matter app");
            println!("(Profile > Settings > Connected Accounts):");
            println!();
            println!("  {}", session_token);
            println!();
            println!("Waiting for confirmation...");
        }
    }

    let Some(tokens) = poll_exchange(&client, &session_token).await else {
        bail!("Timed out waiting for Matter login. Run `matter-sync login` to try again.");
    };

    let mut state = store.load().await.context("Failed to load sync state")?;
    state.access_token = Some(tokens.access_token);
    state.refresh_token = tokens.refresh_token;
    state.qr_session_token = None;
    state.has_completed_initial_setup = true;
    store.save(&state).await.context("Failed to save sync state")?;

    output.success(&format!(
        "Signed in. Highlights will sync into '{}'",
        state.data_dir
    ));

    Ok(())
}

/// Poll the exchange endpoint until tokens are issued or attempts run out
async fn poll_exchange(client: &MatterClient, session_token: &str) -> Option<TokenPair> {
    for attempt in 1..=LOGIN_ATTEMPTS {
        match client.qr_login_exchange(session_token).await {
            Ok(Some(tokens)) => return Some(tokens),
            Ok(None) => {}
            Err(e) => debug!("Login exchange attempt {} failed: {}", attempt, e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    None
}

/// Forget the stored tokens
pub async fn logout(config: &Config, output: &Output) -> Result<()> {
    let store = state_store(config);
    let mut state = store.load().await.context("Failed to load sync state")?;

    if !state.has_credentials() {
        output.message("Not signed in.");
        return Ok(());
    }

    state.clear_credentials();
    store.save(&state).await.context("Failed to save sync state")?;
    output.success("Signed out of Matter");

    Ok(())
}
