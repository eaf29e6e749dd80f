//! Stripe timelines, registered by key.
//!
//! Each timeline is a builder taking the shared [`StripeClient`]. Building
//! makes no provider calls; the runner executes the steps later.

use std::collections::BTreeMap;

use eventseq_core::Timeline;
use eventseq_provider::StripeClient;

mod charge_refund_1;
mod customer_1;
mod customer_payment_method_1;
mod customer_setup_intent_1;
pub mod helpers;

pub type Builder = fn(&StripeClient) -> Timeline;

/// Every registered timeline, in key order.
pub fn registry() -> BTreeMap<&'static str, Builder> {
    let mut all: BTreeMap<&'static str, Builder> = BTreeMap::new();
    all.insert("charge_refund_1", charge_refund_1::timeline);
    all.insert("customer_1", customer_1::timeline);
    all.insert("customer_payment_method_1", customer_payment_method_1::timeline);
    all.insert("customer_setup_intent_1", customer_setup_intent_1::timeline);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventseq_core::Step;

    fn shape(timeline: &Timeline) -> Vec<String> {
        timeline
            .iter()
            .map(|step| match step {
                Step::Tag(t) => format!("tag:{}", t),
                Step::Assert(_) => "assert".to_string(),
                Step::Write(w) => format!("write:{}", w.events.len()),
            })
            .collect()
    }

    #[test]
    fn registry_keys() {
        let keys: Vec<_> = registry().keys().copied().collect();
        assert_eq!(
            keys,
            [
                "charge_refund_1",
                "customer_1",
                "customer_payment_method_1",
                "customer_setup_intent_1"
            ]
        );
        assert!(registry().contains_key("customer_1"));
        assert!(!registry().contains_key("invoice_9"));
    }

    #[test]
    fn every_timeline_tags_each_write() {
        let stripe = StripeClient::new("sk_test_build_only");
        for (key, build) in registry() {
            let timeline = build(&stripe);
            let mut pending = false;
            let mut writes = 0;
            for step in &timeline {
                match step {
                    Step::Tag(_) => {
                        assert!(!pending, "{}: two tags in a row", key);
                        pending = true;
                    }
                    Step::Write(w) => {
                        assert!(pending, "{}: untagged write", key);
                        assert!(!w.events.is_empty(), "{}: write declares no events", key);
                        pending = false;
                        writes += 1;
                    }
                    Step::Assert(_) => {}
                }
            }
            assert!(!pending, "{}: dangling tag", key);
            assert_eq!(writes, 3, "{}", key);
        }
    }

    #[test]
    fn customer_1_shape() {
        let stripe = StripeClient::new("sk_test_build_only");
        let timeline = customer_1::timeline(&stripe);
        assert_eq!(
            shape(&timeline),
            ["tag:c", "write:1", "tag:u", "write:2", "tag:d", "write:1"]
        );
    }
}
