//! Maps validated CLI matches to the action the binary executes.

use crate::cli::{
    actions::{server::Args, Action},
    commands::{ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_FRONTEND_ORIGIN, ARG_PORT, ARG_SEED},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let frontend_origin = matches
        .get_one::<String>(ARG_FRONTEND_ORIGIN)
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty());

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        db_max_connections,
        frontend_origin,
        seed: matches.get_flag(ARG_SEED),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_args() -> Result<()> {
        temp_env::with_vars(
            [
                ("ROSTER_FRONTEND_ORIGIN", None::<&str>),
                ("ROSTER_SEED", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "roster",
                    "-p",
                    "3000",
                    "-d",
                    "memory://",
                    "--seed",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 3000);
                assert_eq!(args.dsn.expose_secret(), "memory://");
                assert!(args.seed);
                assert_eq!(args.frontend_origin, None);
                Ok(())
            },
        )
    }
}
