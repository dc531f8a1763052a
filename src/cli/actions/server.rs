use crate::{
    api::{
        self,
        handlers::auth::{AuthConfig, AuthState},
    },
    cli::globals::GlobalArgs,
    secrets::SecretStore,
    upstream::{DownstreamClient, OAuthProvider, ProviderEndpoints, RetryingUpstreamClient},
    vault::{self, AppRoleLogin, VaultKvSource},
};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub vault_url: String,
    pub vault_role_id: String,
    pub vault_secret_id: Option<String>,
    pub vault_wrapped_token: Option<String>,
    pub vault_kv_mount: String,
    pub vault_kv_path: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub tokeninfo_url: String,
    pub scope: String,
    pub downstream_url: String,
    pub app_entry: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if Vault login fails or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut globals = GlobalArgs::new(args.vault_url);

    // If vault wrapped token try to unwrap, otherwise use secret-id.
    let secret_id = if let Some(wrapped) = &args.vault_wrapped_token {
        vault::unwrap(&globals.vault_url, wrapped).await?
    } else {
        args.vault_secret_id
            .clone()
            .ok_or_else(|| anyhow!("Vault secret-id is required"))?
    };

    let (vault_token, lease_duration) =
        vault::approle_login(&globals.vault_url, &secret_id, &args.vault_role_id).await?;

    globals.set_token(SecretString::from(vault_token), lease_duration);

    debug!("Global args: {:?}", globals);

    // Re-login once the token can no longer be renewed.
    let source = VaultKvSource::new(
        &globals.vault_url,
        globals.vault_token.clone(),
        globals.vault_token_lease_duration,
        &args.vault_kv_mount,
        &args.vault_kv_path,
    )
    .context("Failed to build Vault KV client")?
    .with_approle(AppRoleLogin {
        login_url: globals.vault_url.clone(),
        role_id: args.vault_role_id.clone(),
        secret_id: SecretString::from(secret_id),
    });
    let secrets = Arc::new(SecretStore::new(Arc::new(source)));

    let endpoints = ProviderEndpoints {
        authorize_url: args.authorize_url,
        token_url: args.token_url,
        userinfo_url: args.userinfo_url,
        tokeninfo_url: args.tokeninfo_url,
        redirect_uri: args.redirect_uri,
        scope: args.scope,
    };
    let provider = OAuthProvider::new(endpoints, RetryingUpstreamClient::new(secrets.clone())?)?;
    let downstream = DownstreamClient::new(args.downstream_url)?;

    let auth_state = Arc::new(AuthState::new(
        AuthConfig::new(args.app_entry),
        secrets,
        provider,
        downstream,
    ));

    info!(
        "Secrets are read from {}/{}",
        args.vault_kv_mount, args.vault_kv_path
    );

    api::new(args.port, auth_state).await
}
