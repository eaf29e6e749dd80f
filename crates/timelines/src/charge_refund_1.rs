//! Refunds are children of charges and have no create event of their own.
//!
//! The final step checks that the charge embeds the latest state of its
//! most recent refund.

use eventseq_core::{ensure_eq, RunState, StateDelta, Step, StepError, Timeline};
use eventseq_provider::{Params, StripeClient};
use serde_json::Value;

use crate::helpers::{id_of, test_card, write};

pub fn timeline(stripe: &StripeClient) -> Timeline {
    vec![
        Step::tag("c"),
        write(
            stripe,
            &[
                "customer.created",
                "payment_method.attached",
                "payment_intent.created",
                "charge.succeeded",
                "payment_intent.succeeded",
            ],
            pay,
        ),
        Step::tag("u"),
        write(
            stripe,
            &[
                "charge.refunded",
                "charge.refunded",
                "charge.refund.updated",
                "charge.refund.updated",
                "charge.refund.updated",
            ],
            refund,
        ),
        Step::tag("d"),
        write(stripe, &["charge.updated", "customer.deleted"], finish),
    ]
}

async fn pay(stripe: StripeClient, _state: RunState) -> Result<StateDelta, StepError> {
    let c_1 = id_of(
        &stripe
            .create(
                "customers",
                Params::new()
                    .set("name", "C1.customer_1 Test")
                    .metadata("tid", "c_1"),
            )
            .await?,
    )?;
    let pm_1 = id_of(&stripe.create("payment_methods", test_card("pm_1")).await?)?;
    stripe
        .act(
            "payment_methods",
            &pm_1,
            "attach",
            Params::new().set("customer", &c_1),
        )
        .await?;

    let pi_1 = id_of(
        &stripe
            .create(
                "payment_intents",
                Params::new()
                    .set("amount", 2000)
                    .set("currency", "gbp")
                    .set("customer", &c_1)
                    .set("payment_method_types[0]", "card")
                    .set("payment_method", &pm_1)
                    .metadata("tid", "pi_1"),
            )
            .await?,
    )?;
    stripe
        .act("payment_intents", &pi_1, "confirm", Params::new())
        .await?;

    Ok(StateDelta::new().with("c_1", c_1).with("pi_1", pi_1))
}

async fn refund(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let pi_1 = state.get("pi_1")?;

    // payment intent updates produce no events
    stripe
        .update("payment_intents", pi_1, Params::new().metadata("update", 1))
        .await?;
    let r_1 = stripe
        .create(
            "refunds",
            Params::new()
                .set("payment_intent", pi_1)
                .set("amount", 100)
                .metadata("tid", "r_1"),
        )
        .await?;

    stripe
        .update("payment_intents", pi_1, Params::new().metadata("update", 2))
        .await?;
    let r_2 = id_of(
        &stripe
            .create(
                "refunds",
                Params::new()
                    .set("payment_intent", pi_1)
                    .set("amount", 200)
                    .metadata("tid", "r_2"),
            )
            .await?,
    )?;

    for n in 1..=3 {
        stripe
            .update("refunds", &r_2, Params::new().metadata("update", n))
            .await?;
    }
    stripe
        .update("payment_intents", pi_1, Params::new().metadata("update", 1))
        .await?;

    Ok(StateDelta::new().with("r_1", id_of(&r_1)?).with("r_2", r_2))
}

async fn finish(stripe: StripeClient, state: RunState) -> Result<StateDelta, StepError> {
    let intent = stripe.retrieve("payment_intents", state.get("pi_1")?).await?;
    let charges = intent["charges"]["data"]
        .as_array()
        .ok_or_else(|| StepError::assertion("payment intent has no embedded charges"))?;
    ensure_eq(&charges.len(), &1, "charges on the payment intent")?;

    let charge = &charges[0];
    let latest_refund: &Value = &charge["refunds"]["data"][0];
    ensure_eq(
        &latest_refund["id"].as_str(),
        &Some(state.get("r_2")?),
        "latest refund on the charge",
    )?;
    ensure_eq(
        &latest_refund["metadata"]["update"].as_str(),
        &Some("3"),
        "refund metadata seen through the charge",
    )?;

    stripe
        .update("charges", &id_of(charge)?, Params::new().metadata("update", 1))
        .await?;
    // payment intents, charges and refunds cannot be deleted
    stripe.delete("customers", state.get("c_1")?).await?;
    Ok(StateDelta::new())
}
