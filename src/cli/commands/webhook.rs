//! Webhook receiver and signature tools.

use std::path::Path;

use anyhow::Context;
use tokio::runtime::Runtime;

use super::open_db;
use crate::config::Config;
use crate::model::Provider;
use crate::webhook::{self, WebhookHandler, WebhookServer};

/// Run the callback receiver until the process is stopped
pub fn cmd_serve(
    rt: &Runtime,
    config: &Config,
    bind: Option<&str>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let pool = rt.block_on(open_db(config))?;

    let mut server_config = config.server.clone();
    if let Some(bind) = bind {
        server_config.bind_addr = bind.to_string();
    }
    if let Some(port) = port {
        server_config.port = port;
    }

    for provider in Provider::ALL {
        if config.credentials.webhook_secret(provider).is_none() {
            tracing::warn!(%provider, "No webhook secret configured, signatures will not be checked");
        }
    }

    println!("Listening on http://{}", server_config.address());
    println!("  POST /webhooks/suno");
    println!("  POST /webhooks/mureka");

    let handler = WebhookHandler::new(pool, config.credentials.clone());
    WebhookServer::new(handler, rt.handle().clone(), server_config).run();
    Ok(())
}

fn resolve_secret(config: &Config, provider: &str, secret: Option<&str>) -> anyhow::Result<String> {
    if let Some(secret) = secret {
        return Ok(secret.to_string());
    }
    let provider: Provider = provider.parse()?;
    config
        .credentials
        .webhook_secret(provider)
        .map(str::to_string)
        .with_context(|| format!("No webhook secret configured for {}", provider))
}

/// Print the signature header value for a payload file
pub fn cmd_sign(
    config: &Config,
    provider: &str,
    body: &Path,
    secret: Option<&str>,
) -> anyhow::Result<()> {
    let secret = resolve_secret(config, provider, secret)?;
    let payload = std::fs::read(body).with_context(|| format!("Failed to read {:?}", body))?;
    println!("{}", webhook::sign(&payload, &secret)?);
    Ok(())
}

/// Check a payload file against a signature
pub fn cmd_verify(
    config: &Config,
    provider: &str,
    body: &Path,
    signature: &str,
    secret: Option<&str>,
) -> anyhow::Result<()> {
    let secret = resolve_secret(config, provider, secret)?;
    let payload = std::fs::read(body).with_context(|| format!("Failed to read {:?}", body))?;
    if webhook::verify(&payload, signature, &secret) {
        println!("✓ Signature valid");
        Ok(())
    } else {
        anyhow::bail!("Signature does not match payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_secret_wins() {
        let mut config = Config::default();
        config.credentials.suno_webhook_secret = Some("from-config".into());
        assert_eq!(
            resolve_secret(&config, "suno", Some("flag")).unwrap(),
            "flag"
        );
        assert_eq!(
            resolve_secret(&config, "suno", None).unwrap(),
            "from-config"
        );
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let config = Config::default();
        let err = resolve_secret(&config, "mureka", None).unwrap_err();
        assert!(err.to_string().contains("mureka"));
        assert!(resolve_secret(&config, "udio", None).is_err());
    }

    #[test]
    fn test_sign_then_verify_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.json");
        std::fs::write(&path, br#"{"code":200}"#).unwrap();

        let config = Config::default();
        let sig = webhook::sign(br#"{"code":200}"#, "s3cret").unwrap();
        assert!(cmd_verify(&config, "suno", &path, &sig, Some("s3cret")).is_ok());
        assert!(cmd_verify(&config, "suno", &path, &sig, Some("other")).is_err());
    }
}
