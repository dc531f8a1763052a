use secrecy::SecretString;

#[derive(Clone)]
pub struct GlobalArgs {
    pub vault_url: String,
    pub vault_token: SecretString,
    pub vault_token_lease_duration: u64,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(vurl: String) -> Self {
        Self {
            vault_url: vurl,
            vault_token: SecretString::from(String::new()),
            vault_token_lease_duration: 0,
        }
    }

    pub fn set_token(&mut self, token: SecretString, lease_duration: u64) {
        self.vault_token = token;
        self.vault_token_lease_duration = lease_duration;
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("vault_url", &self.vault_url)
            .field("vault_token", &"***")
            .field(
                "vault_token_lease_duration",
                &self.vault_token_lease_duration,
            )
            .finish()
    }
}
