pub mod server;

use secrecy::SecretString;

/// Actions the CLI can dispatch to.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        signing_secret: SecretString,
        access_token_ttl_minutes: i64,
        refresh_token_ttl_days: i64,
        totp_issuer: String,
    },
}
