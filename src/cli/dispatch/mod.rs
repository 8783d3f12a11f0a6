use crate::cli::actions::Action;
use anyhow::Result;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        identity_url: matches
            .get_one("identity-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --identity-url"))?,
        resolve_timeout_ms: matches
            .get_one::<u64>("resolve-timeout-ms")
            .copied()
            .unwrap_or(3000),
    })
}

#[cfg(test)]
mod tests {
    use super::handler;
    use crate::cli::{actions::Action, commands};

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "soglia",
            "--port",
            "9090",
            "--identity-url",
            "https://id.example.com",
        ]);
        let Action::Server {
            port,
            identity_url,
            resolve_timeout_ms,
        } = handler(&matches).unwrap();
        assert_eq!(port, 9090);
        assert_eq!(identity_url, "https://id.example.com");
        assert_eq!(resolve_timeout_ms, 3000);
    }
}
