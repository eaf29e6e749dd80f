//! Customer create, two updates in one step, delete.

use eventseq_core::{RunState, StateDelta, Step, StepError, Timeline};
use eventseq_provider::{Params, StripeClient};

use crate::helpers::{id_of, write};

pub fn timeline(stripe: &StripeClient) -> Timeline {
    vec![
        Step::tag("c"),
        write(stripe, &["customer.created"], create),
        Step::tag("u"),
        write(stripe, &["customer.updated", "customer.updated"], update),
        Step::tag("d"),
        write(stripe, &["customer.deleted"], delete),
    ]
}

async fn create(stripe: StripeClient, _state: RunState) -> Result<StateDelta, StepError> {
    let customer = stripe
        .create(
            "customers",
            Params::new()
                .set("name", "C1.customer_1 Test")
                .metadata("tid", "c_1"),
        )
        .await?;
    Ok(StateDelta::new().with("c_1", id_of(&customer)?))
}

async fn update(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = state.get("c_1")?;
    stripe
        .update(
            "customers",
            c_1,
            Params::new().set("name", "C1.customer_1 Test Update 0"),
        )
        .await?;
    stripe
        .update(
            "customers",
            c_1,
            Params::new().set("email", "update.1@gmail.com"),
        )
        .await?;
    Ok(StateDelta::new())
}

async fn delete(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    stripe.delete("customers", state.get("c_1")?).await?;
    Ok(StateDelta::new())
}
