//! Effect interpreter.
//!
//! The boundary between the pure planner and the hosting service. Effects
//! are executed sequentially; a failed effect is logged and recorded, and
//! execution continues with the remaining effects.

use tracing::{debug, error};

use approvebot_core::{Effect, PrRef};

use crate::client::HostingClient;
use crate::error::WriteErrors;

/// Execute effects against the hosting service, collecting failures.
pub async fn execute_effects<H>(client: &H, pr: &PrRef, effects: Vec<Effect>) -> WriteErrors
where
    H: HostingClient + ?Sized,
{
    let mut errors = WriteErrors::new();

    for effect in effects {
        let description = effect.to_string();
        debug!("Executing effect on PR {}: {}", pr, description);

        if let Err(err) = execute_effect(client, pr, effect).await {
            error!("Effect execution failed on PR {}: {:#}", pr, err);
            errors.push(format!("{}: {:#}", description, err));
        }
    }

    errors
}

async fn execute_effect<H>(client: &H, pr: &PrRef, effect: Effect) -> anyhow::Result<()>
where
    H: HostingClient + ?Sized,
{
    match effect {
        Effect::AddLabels {
            labels,
            announcement,
        } => {
            client.add_labels(pr, &labels).await?;
            // Only announce labels that were really added.
            if let Some(body) = announcement {
                client.create_comment(pr, &body).await?;
            }
            Ok(())
        }

        Effect::RemoveLabel { label } => client.remove_label(pr, &label).await,

        Effect::CreateComment { body } => client.create_comment(pr, &body).await.map(|_| ()),

        Effect::UpdateComment { id, body } => client.update_comment(pr, id, &body).await,

        Effect::DeleteComment { id } => client.delete_comment(pr, id).await,
    }
}
