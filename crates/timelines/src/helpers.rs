//! Building blocks shared by the timelines.

use std::future::Future;

use eventseq_core::{RunState, StateDelta, Step, StepError};
use eventseq_provider::{Params, ProviderError, StripeClient};
use serde_json::Value;

/// A write step whose action gets its own handle on the client.
pub fn write<F, Fut>(stripe: &StripeClient, events: &[&str], action: F) -> Step
where
    F: Fn(StripeClient, RunState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateDelta, StepError>> + Send + 'static,
{
    let stripe = stripe.clone();
    Step::write(events.to_vec(), move |state| action(stripe.clone(), state))
}

/// As [`write`], but the events may arrive in any order.
pub fn write_unordered<F, Fut>(stripe: &StripeClient, events: &[&str], action: F) -> Step
where
    F: Fn(StripeClient, RunState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateDelta, StepError>> + Send + 'static,
{
    let stripe = stripe.clone();
    Step::write_unordered(events.to_vec(), move |state| action(stripe.clone(), state))
}

/// Succeed only if the provider refuses the call with a 4xx.
///
/// Transport failures and 5xx responses are errors, not rejections.
pub async fn expect_rejection<T, F>(call: &str, request: F) -> Result<(), StepError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match request.await {
        Ok(_) => Err(StepError::UnexpectedSuccess {
            call: call.to_string(),
        }),
        Err(e) if e.is_rejection() => {
            tracing::debug!(call, error = %e, "rejected as expected");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// The `id` of a provider object.
pub fn id_of(object: &Value) -> Result<String, StepError> {
    object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StepError::assertion("provider response has no id"))
}

/// Test card parameters for `payment_methods` create.
pub fn test_card(tid: &str) -> Params {
    Params::new()
        .set("type", "card")
        .set("card[number]", "4242424242424242")
        .set("card[exp_month]", 2)
        .set("card[exp_year]", 2030)
        .set("card[cvc]", "314")
        .metadata("tid", tid)
}
