use crate::{
    cli::telemetry,
    roster,
    service::{seed, Services},
    store::{self, ConnectOptions},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub frontend_origin: Option<String>,
    pub seed: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened, seeding fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = store::connect(
        &args.dsn,
        ConnectOptions {
            max_connections: args.db_max_connections,
        },
    )
    .await?;

    if args.seed {
        let services = Services::new(&store);
        if seed(&services.organizations, &services.users)
            .await
            .context("Failed to seed sample data")?
        {
            info!("Sample data loaded");
        } else {
            info!("Store is not empty, skipping sample data");
        }
    }

    let result = roster::new(args.port, store, args.frontend_origin.as_deref()).await;

    telemetry::shutdown_tracer();

    result
}
