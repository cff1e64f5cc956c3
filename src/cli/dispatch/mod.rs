use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        signing_secret: matches
            .get_one::<String>("signing-secret")
            .map(|s| SecretString::from(s.clone()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --signing-secret"))?,
        access_token_ttl_minutes: matches
            .get_one::<i64>("access-token-ttl-minutes")
            .copied()
            .unwrap_or(30),
        refresh_token_ttl_days: matches
            .get_one::<i64>("refresh-token-ttl-days")
            .copied()
            .unwrap_or(30),
        totp_issuer: matches
            .get_one::<String>("totp-issuer")
            .map_or_else(|| "claviger".to_string(), String::clone),
    })
}
