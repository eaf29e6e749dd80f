//! Payment methods attached to customers that are later deleted.
//!
//! Checks along the way:
//! - an unattached payment method cannot be updated;
//! - deleting a customer leaves its payment method untouched and still
//!   updatable;
//! - a payment method whose customer is gone cannot be used again.

use eventseq_core::{ensure_eq, RunState, StateDelta, Step, StepError, Timeline};
use eventseq_provider::{Params, StripeClient};

use crate::helpers::{expect_rejection, id_of, test_card, write};

pub fn timeline(stripe: &StripeClient) -> Timeline {
    vec![
        Step::tag("c"),
        write(stripe, &["customer.created", "customer.created"], create),
        Step::tag("u"),
        write(
            stripe,
            &[
                "payment_method.attached",
                "payment_method.updated",
                "payment_method.attached",
            ],
            attach,
        ),
        Step::tag("d"),
        write(
            stripe,
            &[
                "payment_method.detached",
                "customer.deleted",
                "customer.deleted",
                "payment_method.updated",
            ],
            delete,
        ),
    ]
}

async fn create(stripe: StripeClient, _state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = stripe
        .create(
            "customers",
            Params::new().set("name", "C1 Test").metadata("tid", "c_1"),
        )
        .await?;
    let c_2 = stripe
        .create(
            "customers",
            Params::new().set("name", "C2 Test").metadata("tid", "c_2"),
        )
        .await?;

    let pm_1 = id_of(&stripe.create("payment_methods", test_card("pm_1")).await?)?;
    expect_rejection(
        "update of an unattached payment method",
        stripe.update(
            "payment_methods",
            &pm_1,
            Params::new().metadata("update", "pm_1 update 1"),
        ),
    )
    .await?;
    let pm_2 = id_of(&stripe.create("payment_methods", test_card("pm_2")).await?)?;

    Ok(StateDelta::new()
        .with("c_1", id_of(&c_1)?)
        .with("c_2", id_of(&c_2)?)
        .with("pm_1", pm_1)
        .with("pm_2", pm_2))
}

async fn attach(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let pm_1 = state.get("pm_1")?;
    let pm_2 = state.get("pm_2")?;

    stripe
        .act(
            "payment_methods",
            pm_1,
            "attach",
            Params::new().set("customer", state.get("c_1")?),
        )
        .await?;
    stripe
        .update(
            "payment_methods",
            pm_1,
            Params::new().metadata("update", "pm_1 update 2"),
        )
        .await?;
    stripe
        .act(
            "payment_methods",
            pm_2,
            "attach",
            Params::new().set("customer", state.get("c_2")?),
        )
        .await?;
    Ok(StateDelta::new())
}

async fn delete(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let pm_2 = state.get("pm_2")?;

    stripe
        .act("payment_methods", state.get("pm_1")?, "detach", Params::new())
        .await?;
    stripe.delete("customers", state.get("c_1")?).await?;

    let before = stripe.retrieve("payment_methods", pm_2).await?;
    stripe.delete("customers", state.get("c_2")?).await?;
    let after = stripe.retrieve("payment_methods", pm_2).await?;
    // still points at the deleted customer, no status change
    ensure_eq(&before, &after, "payment method after its customer was deleted")?;

    stripe
        .update(
            "payment_methods",
            pm_2,
            Params::new()
                .set("billing_details[email]", "assert-fails@example.com")
                .metadata("update_1", "pm_2 update_1"),
        )
        .await?;

    expect_rejection(
        "setup intent reusing a payment method of a deleted customer",
        stripe.create("setup_intents", Params::new().set("payment_method", pm_2)),
    )
    .await?;
    Ok(StateDelta::new())
}
