//! Property-based tests for pricing and notification authenticity.

use proptest::prelude::*;
use storefront_api::common::line_total_minor;
use storefront_api::services::order_builder::PricingPolicy;
use storefront_api::services::payment_gateway::{validate_reference, NotificationAuthenticator};

fn cart_strategy() -> impl Strategy<Value = Vec<(i64, i32)>> {
    // (unit price in kobo, quantity)
    prop::collection::vec((1i64..10_000_000, 1i32..=100), 1..50)
}

fn line_totals(cart: &[(i64, i32)]) -> Vec<i64> {
    cart.iter()
        .map(|(price, qty)| line_total_minor(*price, *qty).expect("no overflow in range"))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn totals_are_deterministic(cart in cart_strategy()) {
        let policy = PricingPolicy::default();
        let first = policy.totals(line_totals(&cart)).unwrap();
        let second = policy.totals(line_totals(&cart)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn totals_ignore_line_order(cart in cart_strategy(), shift in 0usize..50) {
        let policy = PricingPolicy::default();
        let mut rotated = cart.clone();
        let len = rotated.len();
        rotated.rotate_left(shift % len);
        rotated.reverse();

        prop_assert_eq!(
            policy.totals(line_totals(&cart)).unwrap(),
            policy.totals(line_totals(&rotated)).unwrap()
        );
    }

    #[test]
    fn total_is_subtotal_plus_flat_delivery(cart in cart_strategy()) {
        let policy = PricingPolicy::default();
        let totals = policy.totals(line_totals(&cart)).unwrap();
        let expected: i64 = cart.iter().map(|(p, q)| p * i64::from(*q)).sum();

        prop_assert_eq!(totals.subtotal_minor, expected);
        prop_assert_eq!(totals.delivery_minor, 150_000);
        prop_assert_eq!(totals.total_minor, expected + 150_000);
    }

    #[test]
    fn any_single_byte_change_breaks_the_signature(
        body in prop::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let auth = NotificationAuthenticator::new("sk_test_property");
        let signature = auth.sign(&body).unwrap();
        prop_assert!(auth.verify_signature(&body, Some(&signature)).is_ok());

        let mut tampered = body.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= flip;
        prop_assert!(auth.verify_signature(&tampered, Some(&signature)).is_err());
    }

    #[test]
    fn gateway_style_references_are_accepted(reference in "[A-Za-z0-9_.=-]{1,100}") {
        prop_assert!(validate_reference(&reference).is_ok());
    }

    #[test]
    fn references_with_path_characters_are_rejected(
        prefix in "[A-Za-z0-9]{0,10}",
        bad in prop_oneof!["/", " ", "\\?", "#", "%"],
    ) {
        let reference = format!("{}{}", prefix, bad);
        prop_assert!(validate_reference(&reference).is_err());
    }
}

#[test]
fn empty_cart_has_no_delivery_fee() {
    let totals = PricingPolicy::default().totals(Vec::<i64>::new()).unwrap();
    assert_eq!(totals.total_minor, 0);
    assert_eq!(totals.delivery_minor, 0);
}
