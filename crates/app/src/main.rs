//! Tessera - Main Entry Point
//!
//! Loads settings, assembles the client stack and runs one command.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tessera_application::ClientError;
use tessera_domain::{
    Identity, Token,
    request::{RequestBody, RequestSpec},
};
use tessera_infrastructure::{ClientSettings, ClientStack, connect};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = ClientSettings::load(cli.config.as_deref()).context("loading settings")?;
    let stack = connect(&settings).await.context("opening session")?;
    info!(version = env!("CARGO_PKG_VERSION"), base_url = %settings.base_url, "tessera ready");

    match cli.command {
        Command::Login { token, user } => login(&stack, &token, user.as_deref()).await,
        Command::Logout => {
            stack.session.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Command::Whoami => whoami(&stack).await,
        Command::Profile { patch } => profile(&stack, &patch).await,
        Command::Send {
            method,
            target,
            headers,
            data,
        } => {
            let mut request = RequestSpec::new(method, settings.resolve(&target)?)
                .with_timeout_ms(settings.request_timeout_ms);
            for header in headers {
                request.headers.add(header);
            }
            if let Some(data) = data {
                request = request.with_body(body_for(data));
            }
            send(&stack, request).await
        }
    }
}

async fn login(stack: &ClientStack, token: &str, user: Option<&str>) -> Result<()> {
    let token = Token::new(token).context("invalid token")?;
    let user = match user {
        Some(raw) => parse_identity(raw).context("invalid --user")?,
        None => Identity::new(),
    };

    stack.session.login(&token, &user).await?;
    stack.notifier.reactivate();
    println!("Logged in ({})", token.preview());
    Ok(())
}

async fn whoami(stack: &ClientStack) -> Result<()> {
    if !stack.session.is_authenticated().await? {
        println!("Not logged in");
        return Ok(());
    }
    match stack.session.current_user().await? {
        Some(user) if !user.is_empty() => {
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        _ => println!("Logged in, no user profile stored"),
    }
    Ok(())
}

async fn profile(stack: &ClientStack, patch: &str) -> Result<()> {
    let patch = parse_identity(patch).context("invalid profile update")?;
    match stack.session.update_user(patch).await? {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => bail!("not logged in; nothing to update"),
    }
    Ok(())
}

fn parse_identity(raw: &str) -> Result<Identity> {
    let value: serde_json::Value = serde_json::from_str(raw).context("not JSON")?;
    Ok(Identity::from_value(value)?)
}

async fn send(stack: &ClientStack, request: RequestSpec) -> Result<()> {
    match stack.client.send(request).await {
        Ok(response) => {
            println!("HTTP {} ({} ms)", response.status, response.duration.as_millis());
            let body = response.text();
            if !body.is_empty() {
                println!("{body}");
            }
            if response.is_success() {
                Ok(())
            } else {
                bail!("request failed with status {}", response.status)
            }
        }
        Err(ClientError::Refresh(failure)) => {
            let status = stack.notifier.status();
            let route = status.redirect_to().unwrap_or("/");
            bail!("session ended: {failure}; log in again at {route}")
        }
        Err(e) => Err(e.into()),
    }
}

fn body_for(data: String) -> RequestBody {
    if serde_json::from_str::<serde_json::Value>(&data).is_ok() {
        RequestBody::json(data)
    } else {
        RequestBody::text(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_data_is_sent_as_json() {
        assert_eq!(
            body_for(r#"{"a": 1}"#.to_string()).content_type(),
            Some("application/json")
        );
        assert_eq!(
            body_for("plain words".to_string()).content_type(),
            Some("text/plain")
        );
    }

    #[test]
    fn test_profile_patch_must_be_an_object() {
        assert_eq!(
            parse_identity(r#"{"name": "Bo"}"#).unwrap(),
            Identity::new().with("name", "Bo")
        );
        assert!(parse_identity("[1, 2]").is_err());
        assert!(parse_identity("name=Bo").is_err());
    }
}
