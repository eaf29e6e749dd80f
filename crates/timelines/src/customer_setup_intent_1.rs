//! A setup intent joined to a customer and payment method after creation.
//!
//! Checks that a customer cannot be set without a payment method, that the
//! intent keeps pointing at a deleted customer, and that a succeeded intent
//! cannot be cancelled.

use eventseq_core::{ensure_eq, RunState, StateDelta, Step, StepError, Timeline};
use eventseq_provider::{Params, StripeClient};

use crate::helpers::{expect_rejection, id_of, test_card, write, write_unordered};

pub fn timeline(stripe: &StripeClient) -> Timeline {
    vec![
        Step::tag("c"),
        write(stripe, &["customer.created", "setup_intent.created"], create),
        Step::tag("u"),
        write_unordered(
            stripe,
            &["payment_method.attached", "setup_intent.succeeded"],
            connect,
        ),
        Step::tag("d"),
        write(stripe, &["customer.deleted"], delete),
    ]
}

async fn create(stripe: StripeClient, _state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = stripe
        .create(
            "customers",
            Params::new()
                .set("name", "C1.customer_1 Test")
                .metadata("tid", "c_1"),
        )
        .await?;
    let pm_1 = stripe.create("payment_methods", test_card("pm_1")).await?;
    let si_1 = stripe
        .create(
            "setup_intents",
            Params::new()
                .set("payment_method_types[0]", "card")
                .metadata("tid", "si_1"),
        )
        .await?;

    Ok(StateDelta::new()
        .with("c_1", id_of(&c_1)?)
        .with("pm_1", id_of(&pm_1)?)
        .with("si_1", id_of(&si_1)?))
}

async fn connect(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = state.get("c_1")?;
    let si_1 = state.get("si_1")?;

    expect_rejection(
        "setup intent customer update without a payment method",
        stripe.update("setup_intents", si_1, Params::new().set("customer", c_1)),
    )
    .await?;

    stripe
        .update(
            "setup_intents",
            si_1,
            Params::new()
                .set("customer", c_1)
                .set("payment_method", state.get("pm_1")?),
        )
        .await?;
    stripe
        .act("setup_intents", si_1, "confirm", Params::new())
        .await?;
    Ok(StateDelta::new())
}

async fn delete(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = state.get("c_1")?;
    let si_1 = state.get("si_1")?;

    stripe.delete("customers", c_1).await?;

    let intent = stripe.retrieve("setup_intents", si_1).await?;
    ensure_eq(
        &intent["customer"].as_str(),
        &Some(c_1),
        "setup intent customer after delete",
    )?;

    expect_rejection(
        "cancel of a succeeded setup intent",
        stripe.act("setup_intents", si_1, "cancel", Params::new()),
    )
    .await?;
    Ok(StateDelta::new())
}
