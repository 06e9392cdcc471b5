use clap::Args;
use edgecert_renewal::{RenewalOrchestrator, RenewalRunner, TriggerKind};
use std::sync::Arc;
use tracing::info;

use super::config::RenewalArgs;

#[derive(Args)]
pub struct RenewCommand {
    #[command(flatten)]
    pub renewal: RenewalArgs,
}

impl RenewCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.renewal.into_config()?;
        config.validate(false)?;

        let rt = tokio::runtime::Runtime::new()?;
        let outcome = rt.block_on(async {
            let orchestrator = RenewalOrchestrator::from_config(&config)?;
            let runner = RenewalRunner::new(Arc::new(orchestrator), config.domain.clone());
            info!(domain = %config.domain, "Starting manual renewal");
            Ok::<_, anyhow::Error>(runner.trigger(TriggerKind::Manual).await)
        })?;

        println!("{}", serde_json::to_string_pretty(&outcome)?);

        if !outcome.success {
            anyhow::bail!(
                "Renewal failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}
