//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{oauth, vault, ARG_PORT};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or a URL is invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let vault_opts = vault::Options::parse(matches)?;
    let oauth_opts = oauth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        vault_url: vault_opts.url,
        vault_role_id: vault_opts.role_id,
        vault_secret_id: vault_opts.secret_id,
        vault_wrapped_token: vault_opts.wrapped_token,
        vault_kv_mount: vault_opts.kv_mount,
        vault_kv_path: vault_opts.kv_path,
        redirect_uri: oauth_opts.redirect_uri,
        authorize_url: oauth_opts.authorize_url,
        token_url: oauth_opts.token_url,
        userinfo_url: oauth_opts.userinfo_url,
        tokeninfo_url: oauth_opts.tokeninfo_url,
        scope: oauth_opts.scope,
        downstream_url: oauth_opts.downstream_url,
        app_entry: oauth_opts.app_entry,
    }))
}
