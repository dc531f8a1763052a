use crate::{
    api::handlers::auth::state::DEFAULT_APP_ENTRY,
    upstream::{downstream::DEFAULT_DOWNSTREAM_URL, provider},
};
use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

pub const ARG_REDIRECT_URI: &str = "redirect-uri";
pub const ARG_AUTHORIZE_URL: &str = "authorize-url";
pub const ARG_TOKEN_URL: &str = "token-url";
pub const ARG_USERINFO_URL: &str = "userinfo-url";
pub const ARG_TOKENINFO_URL: &str = "tokeninfo-url";
pub const ARG_SCOPE: &str = "scope";
pub const ARG_DOWNSTREAM_URL: &str = "downstream-url";
pub const ARG_APP_ENTRY: &str = "app-entry";

#[derive(Debug)]
pub struct Options {
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub tokeninfo_url: String,
    pub scope: String,
    pub downstream_url: String,
    pub app_entry: String,
}

fn value(matches: &ArgMatches, id: &str, default: &str) -> String {
    matches
        .get_one::<String>(id)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

impl Options {
    /// # Errors
    /// Returns an error if a provider URL is not a valid URL.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let options = Self {
            redirect_uri: value(matches, ARG_REDIRECT_URI, provider::DEFAULT_REDIRECT_URI),
            authorize_url: value(matches, ARG_AUTHORIZE_URL, provider::DEFAULT_AUTHORIZE_URL),
            token_url: value(matches, ARG_TOKEN_URL, provider::DEFAULT_TOKEN_URL),
            userinfo_url: value(matches, ARG_USERINFO_URL, provider::DEFAULT_USERINFO_URL),
            tokeninfo_url: value(matches, ARG_TOKENINFO_URL, provider::DEFAULT_TOKENINFO_URL),
            scope: value(matches, ARG_SCOPE, provider::DEFAULT_SCOPE),
            downstream_url: value(matches, ARG_DOWNSTREAM_URL, DEFAULT_DOWNSTREAM_URL),
            app_entry: value(matches, ARG_APP_ENTRY, DEFAULT_APP_ENTRY),
        };

        for (name, url) in [
            (ARG_REDIRECT_URI, &options.redirect_uri),
            (ARG_AUTHORIZE_URL, &options.authorize_url),
            (ARG_TOKEN_URL, &options.token_url),
            (ARG_USERINFO_URL, &options.userinfo_url),
            (ARG_TOKENINFO_URL, &options.tokeninfo_url),
            (ARG_DOWNSTREAM_URL, &options.downstream_url),
        ] {
            url::Url::parse(url).map_err(|err| anyhow::anyhow!("invalid --{name} {url}: {err}"))?;
        }

        Ok(options)
    }
}

fn provider_arg(id: &'static str, env: &'static str, help: &'static str, default: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .env(env)
        .default_value(default)
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(provider_arg(
            ARG_REDIRECT_URI,
            "TRACEGATE_REDIRECT_URI",
            "OAuth redirect URI registered with the provider",
            provider::DEFAULT_REDIRECT_URI,
        ))
        .arg(provider_arg(
            ARG_AUTHORIZE_URL,
            "TRACEGATE_AUTHORIZE_URL",
            "Provider authorization endpoint",
            provider::DEFAULT_AUTHORIZE_URL,
        ))
        .arg(provider_arg(
            ARG_TOKEN_URL,
            "TRACEGATE_TOKEN_URL",
            "Provider token endpoint",
            provider::DEFAULT_TOKEN_URL,
        ))
        .arg(provider_arg(
            ARG_USERINFO_URL,
            "TRACEGATE_USERINFO_URL",
            "Provider userinfo endpoint",
            provider::DEFAULT_USERINFO_URL,
        ))
        .arg(provider_arg(
            ARG_TOKENINFO_URL,
            "TRACEGATE_TOKENINFO_URL",
            "Provider token introspection endpoint",
            provider::DEFAULT_TOKENINFO_URL,
        ))
        .arg(provider_arg(
            ARG_SCOPE,
            "TRACEGATE_SCOPE",
            "Scopes requested at sign-in",
            provider::DEFAULT_SCOPE,
        ))
        .arg(provider_arg(
            ARG_DOWNSTREAM_URL,
            "TRACEGATE_DOWNSTREAM_URL",
            "Trace metrics API the proxy forwards to",
            DEFAULT_DOWNSTREAM_URL,
        ))
        .arg(provider_arg(
            ARG_APP_ENTRY,
            "TRACEGATE_APP_ENTRY",
            "Page users land on after sign-in",
            DEFAULT_APP_ENTRY,
        ))
}
