use proptest::prelude::*;
use rampart_core::{
    generate_provisional_id, is_provisional_id, is_provisional_value, LineItem, LineItemInput,
    PurchaseOrder, PurchaseOrderInput, RecordId, PROVISIONAL_PREFIX,
};
use serde_json::json;

fn line_item_input() -> impl Strategy<Value = LineItemInput> {
    (0u32..10_000, 0u32..100_000, 0u32..=100).prop_map(|(quantity, cents, rate)| {
        LineItemInput::new("item", quantity as f64, cents as f64 / 100.0, rate as f64)
    })
}

#[test]
fn reference_line_item_totals() {
    let item = LineItem::optimistic(LineItemInput::new("Cement", 100.0, 50.0, 18.0)).unwrap();
    assert_eq!(item.tax_amount, 900.0);
    assert_eq!(item.total_amount, 5900.0);
}

proptest! {
    #[test]
    fn line_item_matches_formula(input in line_item_input()) {
        let expected_tax = input.quantity * input.unit_price * input.tax_rate / 100.0;
        let expected_total = input.quantity * input.unit_price + expected_tax;
        let item = LineItem::optimistic(input).unwrap();
        prop_assert_eq!(item.tax_amount, expected_tax);
        prop_assert_eq!(item.total_amount, expected_total);
        prop_assert!(item.is_optimistic);
        prop_assert!(item.id.is_provisional());
    }

    #[test]
    fn zero_tax_rate_means_no_tax(quantity in 0u32..1000, price in 0u32..1000) {
        let input = LineItemInput::new("x", quantity as f64, price as f64, 0.0);
        let item = LineItem::optimistic(input).unwrap();
        prop_assert_eq!(item.tax_amount, 0.0);
        prop_assert_eq!(item.total_amount, quantity as f64 * price as f64);
    }

    #[test]
    fn purchase_order_totals_follow_items(
        inputs in prop::collection::vec(line_item_input(), 0..20),
    ) {
        let items: Vec<LineItem> = inputs
            .into_iter()
            .map(|input| LineItem::optimistic(input).unwrap())
            .collect();
        let expected: f64 = items.iter().map(|item| item.total_amount).sum();
        let count = items.len();

        let order = PurchaseOrder::optimistic(PurchaseOrderInput {
            supplier: "Acme".to_string(),
            notes: None,
            items,
        })
        .unwrap();
        prop_assert_eq!(order.grand_total, expected);
        prop_assert_eq!(order.item_count, count);
        prop_assert!(order.id.is_provisional());
    }

    #[test]
    fn negative_amounts_are_rejected(quantity in 1u32..1000, price in 1u32..1000) {
        let input = LineItemInput::new("x", -(quantity as f64), price as f64, 5.0);
        prop_assert!(LineItem::optimistic(input).is_err());
    }

    #[test]
    fn strings_without_prefix_are_not_provisional(s in "[a-zA-Z0-9_-]{0,32}") {
        prop_assume!(!s.starts_with(PROVISIONAL_PREFIX));
        prop_assert!(!is_provisional_id(&s));
        prop_assert!(!RecordId::from_raw(s).is_provisional());
    }

    #[test]
    fn numbers_are_never_provisional(n in any::<i64>()) {
        prop_assert!(!is_provisional_value(&json!(n)));
    }
}

#[test]
fn generated_ids_round_trip_through_json() {
    let id = generate_provisional_id();
    assert!(is_provisional_value(&json!(id)));
    assert!(!is_provisional_value(&json!(null)));
    assert!(!is_provisional_value(&json!({})));
}
