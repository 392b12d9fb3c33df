#![forbid(unsafe_code)]
//! Pure query-text helpers. Everything here takes and returns strings;
//! no engine types, no I/O.
//!
//! The centerpiece is [`to_count_query`], which derives a counting form
//! of an arbitrary select statement the way the legacy template did:
//! textual token matching, not parsing. The quirks of that approach are
//! deliberate and pinned by tests; the derived text is only ever
//! syntax-checked by the engine that executes it.

use std::sync::OnceLock;

use regex::Regex;

fn order_by_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)order\s*by.*$").expect("order-by pattern compiles"))
}

fn from_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)from").expect("from-token pattern compiles"))
}

/// Removes everything from the first `order by` (any case, any spacing
/// between the two words) to the end of the text.
pub fn strip_order_by(text: &str) -> String {
    order_by_pattern().replace(text, "").into_owned()
}

/// The select list: text strictly between the first literal `select` and
/// the first literal `from` after it, trimmed. Both tokens are matched
/// lowercase-only; `None` when either is absent or the list is blank.
pub fn select_list(text: &str) -> Option<String> {
    let start = text.find("select")? + "select".len();
    let rest = &text[start..];
    let end = rest.find("from")?;
    let list = rest[..end].trim();
    if list.is_empty() {
        None
    } else {
        Some(list.to_string())
    }
}

/// Drops everything before the first case-insensitive `from`, keeping
/// `from` itself. Text without a `from` is returned unchanged; the
/// engine rejects the malformed derivation instead.
pub fn remove_select(text: &str) -> &str {
    match from_token_pattern().find(text) {
        Some(token) => &text[token.start()..],
        None => text,
    }
}

/// Derives the counting form of a select statement.
///
/// The projected select list, when present and non-blank, becomes the
/// count argument verbatim; otherwise `*` is counted. Any `order by`
/// tail is dropped. The result keeps the legacy template's single
/// trailing space.
pub fn to_count_query(text: &str) -> String {
    let arg = select_list(text).unwrap_or_else(|| "*".to_string());
    let stripped = strip_order_by(text);
    let remainder = remove_select(&stripped).trim();
    format!("select count({arg}) {remainder} ")
}

/// A plain `from` clause over an entity name and alias.
pub fn from_clause(entity: &str, alias: &str) -> String {
    format!("from {entity} {alias}")
}

/// A `from` clause for a mapped entity type.
pub fn entity_query<E: daokit_core::EntityDef>(alias: &str) -> String {
    from_clause(E::ENTITY_NAME, alias)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_of_projected_select_keeps_the_select_list() {
        let text = "select o.id, o.name from Order o where o.status = :s order by o.id desc";
        assert_eq!(
            to_count_query(text),
            "select count(o.id, o.name) from Order o where o.status = :s "
        );
    }

    #[test]
    fn count_of_bare_from_counts_star() {
        let text = "from Order o where o.status = :s";
        assert_eq!(
            to_count_query(text),
            "select count(*) from Order o where o.status = :s "
        );
    }

    #[test]
    fn blank_select_list_counts_star() {
        assert_eq!(
            to_count_query("select   from Order o"),
            "select count(*) from Order o "
        );
    }

    #[test]
    fn uppercase_select_is_not_recognized_as_a_list() {
        // The select/from token scan is lowercase-only on purpose.
        assert_eq!(
            to_count_query("SELECT o.id FROM Order o"),
            "select count(*) FROM Order o "
        );
    }

    #[test]
    fn strip_order_by_is_case_insensitive_and_spacing_tolerant() {
        assert_eq!(
            strip_order_by("from Order o ORDER   BY o.id"),
            "from Order o "
        );
        assert_eq!(strip_order_by("from Order o order\nby o.id"), "from Order o ");
        assert_eq!(strip_order_by("from Order o"), "from Order o");
    }

    #[test]
    fn strip_order_by_consumes_to_end_of_text() {
        assert_eq!(
            strip_order_by("from Order o order by o.id asc, o.name desc"),
            "from Order o "
        );
    }

    #[test]
    fn select_list_requires_both_tokens() {
        assert_eq!(
            select_list("select a.x, a.y from T a"),
            Some("a.x, a.y".to_string())
        );
        assert_eq!(select_list("from T a"), None);
        assert_eq!(select_list("select a.x"), None);
    }

    #[test]
    fn remove_select_keeps_from_onward() {
        assert_eq!(
            remove_select("select o.id from Order o"),
            "from Order o"
        );
        assert_eq!(remove_select("select o.id FROM Order o"), "FROM Order o");
        assert_eq!(remove_select("no tokens here"), "no tokens here");
    }

    #[test]
    fn missing_from_leaves_text_for_the_engine_to_reject() {
        assert_eq!(to_count_query("bogus text"), "select count(*) bogus text ");
    }

    #[test]
    fn from_clause_formats_entity_and_alias() {
        assert_eq!(from_clause("Member", "X"), "from Member X");
    }

    #[test]
    fn entity_query_reads_the_mapped_name() {
        struct Invoice;
        impl daokit_core::EntityDef for Invoice {
            const ENTITY_NAME: &'static str = "Invoice";
            const ID_PROPERTY: &'static str = "id";
            const PROPERTIES: &'static [&'static str] = &["id"];
        }
        assert_eq!(entity_query::<Invoice>("X"), "from Invoice X");
    }

    #[test]
    fn derived_text_always_ends_with_one_space() {
        for text in [
            "from Member X",
            "select m.id from Member m",
            "from Member X order by X.name",
        ] {
            let derived = to_count_query(text);
            assert!(derived.ends_with(' '));
            assert!(!derived.ends_with("  "));
        }
    }
}
