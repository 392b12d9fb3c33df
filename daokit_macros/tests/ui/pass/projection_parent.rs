use chrono::NaiveDateTime;
use daokit::{Projection, RowShape, ScalarKind, ToValue};
use rust_decimal::Decimal;

#[derive(Projection, Debug, Clone, PartialEq)]
struct AuditColumns {
    register_time: NaiveDateTime,
    last_login_ip: Option<String>,
}

#[derive(Projection, Debug, Clone, PartialEq)]
struct MemberSummary {
    member_id: i64,
    name: String,
    balance: Decimal,
    #[projection(parent)]
    audit: AuditColumns,
}

fn main() {
    // Declared types drive the column kinds.
    let kinds: Vec<(&str, ScalarKind)> = MemberSummary::fields()
        .iter()
        .map(|f| (f.name, f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("member_id", ScalarKind::BigInt),
            ("name", ScalarKind::Text),
            ("balance", ScalarKind::Decimal),
            ("register_time", ScalarKind::Timestamp),
            ("last_login_ip", ScalarKind::Text),
        ]
    );
    // The parent contributes exactly its own columns.
    assert_eq!(AuditColumns::DIRECT_FIELDS.len(), 2);
    assert_eq!(MemberSummary::DIRECT_FIELDS.len(), 3);

    let when = NaiveDateTime::parse_from_str("2024-05-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    let mut row = daokit::Row::new();
    row.set("member_id", 5i64.to_value());
    row.set("name", "ada".to_value());
    row.set("balance", Decimal::new(1250, 2).to_value());
    row.set("register_time", when.to_value());
    row.set("last_login_ip", daokit::Value::Null);

    let summary = MemberSummary::from_projected(&row).unwrap();
    assert_eq!(summary.member_id, 5);
    assert_eq!(summary.audit.register_time, when);
    assert_eq!(summary.audit.last_login_ip, None);
}
