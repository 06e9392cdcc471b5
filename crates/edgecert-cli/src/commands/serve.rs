use clap::Args;
use edgecert_renewal::{RenewalOrchestrator, RenewalRunner};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::config::RenewalArgs;
use crate::trigger::{configure_routes, parse_schedule, run_schedule, TriggerState};

#[derive(Args)]
pub struct ServeCommand {
    #[command(flatten)]
    pub renewal: RenewalArgs,

    /// Address to bind the HTTP trigger to
    #[arg(long, default_value = "0.0.0.0:8080", env = "EDGECERT_ADDRESS")]
    pub address: String,

    /// Shared secret expected as `Authorization: Bearer <token>`
    #[arg(long, env = "EDGECERT_TRIGGER_TOKEN", hide_env_values = true)]
    pub trigger_token: String,

    /// Cron expression (sec min hour day month weekday) for scheduled renewals
    #[arg(long, default_value = "0 0 3 * * *", env = "EDGECERT_SCHEDULE")]
    pub schedule: String,

    /// Only serve the HTTP trigger
    #[arg(long, env = "EDGECERT_NO_SCHEDULE")]
    pub no_schedule: bool,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let ServeCommand {
            renewal,
            address,
            trigger_token,
            schedule: schedule_expr,
            no_schedule,
        } = self;

        let config = renewal
            .into_config()?
            .with_trigger_token(trigger_token.clone());
        config.validate(true)?;

        let schedule = if no_schedule {
            None
        } else {
            Some(parse_schedule(&schedule_expr)?)
        };

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            let orchestrator = RenewalOrchestrator::from_config(&config)?;
            let runner = Arc::new(RenewalRunner::new(
                Arc::new(orchestrator),
                config.domain.clone(),
            ));

            let cancellation_token = CancellationToken::new();

            let scheduler = schedule.map(|schedule| {
                info!(schedule = %schedule_expr, "Scheduled renewals enabled");
                tokio::spawn(run_schedule(
                    schedule,
                    runner.clone(),
                    cancellation_token.clone(),
                ))
            });

            let app = configure_routes(TriggerState::new(runner, &trigger_token))
                .layer(TraceLayer::new_for_http());

            let listener = tokio::net::TcpListener::bind(&address).await?;
            info!(
                domain = %config.domain,
                "Renewal trigger listening on {}",
                listener.local_addr()?
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(cancellation_token.clone()))
                .await?;

            // A scheduled run that already started is allowed to finish so its
            // challenge records get cleaned up
            cancellation_token.cancel();
            if let Some(handle) = scheduler {
                if let Err(e) = handle.await {
                    error!("Scheduler task failed: {}", e);
                }
            }

            info!("Shutdown complete");
            Ok::<(), anyhow::Error>(())
        })
    }
}

async fn shutdown_signal(cancellation_token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C, initiating graceful shutdown...");
    cancellation_token.cancel();
}
