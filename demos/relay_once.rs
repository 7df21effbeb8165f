//! Relay one prompt to the configured backend and print the raw event stream.
//!
//! ```text
//! CHATGPT_ACCESS_TOKEN=... CHATGPT_ACCOUNT_ID=... CHATGPT_REFRESH_TOKEN=... \
//!     RUST_LOG=chatgpt_relay=debug cargo run --example relay_once -- "Say hi"
//! ```

use chatgpt_relay::auth::{OAuthConfig, OAuthCredentialGateway, TokenSet};
use chatgpt_relay::{Dispatcher, PrimaryParams, RelayConfig};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let prompt = std::env::args().nth(1).unwrap_or_else(|| "Say hello.".to_string());

    let tokens = std::env::var("CHATGPT_ACCESS_TOKEN").ok().map(|access| {
        let mut tokens = TokenSet::from_access_token(access);
        if let Ok(account) = std::env::var("CHATGPT_ACCOUNT_ID") {
            tokens = tokens.with_account_id(account);
        }
        if let Ok(refresh) = std::env::var("CHATGPT_REFRESH_TOKEN") {
            tokens = tokens.with_refresh_token(refresh);
        }
        tokens
    });

    let dispatcher = Dispatcher::builder()
        .config(RelayConfig::from_env()?)
        .credentials(Arc::new(OAuthCredentialGateway::new(OAuthConfig::default(), tokens)))
        .build()?;

    let params = PrimaryParams::new(
        "gpt-5",
        vec![serde_json::json!({
            "role": "user",
            "content": [{"type": "input_text", "text": prompt}]
        })],
    );

    match dispatcher.dispatch(params).await {
        Ok(response) => {
            let mut stream = response.bytes_stream();
            let mut stdout = std::io::stdout();
            while let Some(chunk) = stream.next().await {
                stdout.write_all(&chunk?)?;
            }
        }
        Err(err) => {
            eprintln!("HTTP {}: {}", err.status().as_u16(), err.to_json());
            std::process::exit(1);
        }
    }
    Ok(())
}
