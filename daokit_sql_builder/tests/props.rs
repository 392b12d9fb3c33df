//! Property tests for the count-query derivation.
//!
//! Identifier strategies deliberately avoid the letters that could spell
//! the scanned tokens (`select`, `from`, `order`, `by`), so the
//! properties hold without tripping the intentional textual quirks.

use daokit_sql_builder::{select_list, strip_order_by, to_count_query};
use proptest::prelude::*;

proptest! {
    #[test]
    fn bare_from_counts_star(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,3}",
        prop in "[a-e]{1,6}",
        param in "[a-e]{1,6}",
    ) {
        let text = format!("from {entity} {alias} where {alias}.{prop} = :{param}");
        let derived = to_count_query(&text);
        prop_assert_eq!(
            derived,
            format!("select count(*) from {entity} {alias} where {alias}.{prop} = :{param} ")
        );
    }

    #[test]
    fn select_list_survives_as_count_argument(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,2}",
        cols in prop::collection::vec("[a-e]{1,5}", 1..4),
    ) {
        let list = cols
            .iter()
            .map(|c| format!("{alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("select {list} from {entity} {alias}");
        prop_assert_eq!(
            to_count_query(&text),
            format!("select count({list}) from {entity} {alias} ")
        );
    }

    #[test]
    fn order_by_never_affects_the_derivation(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,3}",
        prop in "[a-e]{1,6}",
        param in "[a-e]{1,6}",
        sort_prop in "[a-e]{1,6}",
    ) {
        let base = format!("from {entity} {alias} where {alias}.{prop} = :{param}");
        let with_order = format!("{base} order by {alias}.{sort_prop} desc");
        prop_assert_eq!(to_count_query(&base), to_count_query(&with_order));
    }

    #[test]
    fn stripping_is_idempotent(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,3}",
        sort_prop in "[a-e]{1,6}",
    ) {
        let text = format!("from {entity} {alias} order by {alias}.{sort_prop}");
        let once = strip_order_by(&text);
        prop_assert_eq!(strip_order_by(&once), once.clone());
    }

    #[test]
    fn derived_text_has_exactly_one_trailing_space(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,3}",
        prop in "[a-e]{1,6}",
    ) {
        let derived = to_count_query(&format!(
            "select {alias}.{prop} from {entity} {alias}"
        ));
        prop_assert!(derived.ends_with(' '));
        prop_assert!(!derived.ends_with("  "));
    }

    #[test]
    fn select_list_is_none_without_both_tokens(
        entity in "[A-E][a-e]{1,8}",
        alias in "[a-e]{1,3}",
    ) {
        prop_assert_eq!(select_list(&format!("from {entity} {alias}")), None);
    }
}
