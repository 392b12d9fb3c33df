use daokit::{Entity, EntityDef, FromRow, HasId, ToValue};

#[derive(Entity, Debug, Clone, PartialEq)]
#[entity(name = "MemberAccount")]
struct Member {
    #[orm(id)]
    id: i64,
    #[orm(property = "loginName")]
    login_name: String,
    #[orm(skip)]
    cached_display: String,
}

fn main() {
    assert_eq!(Member::ENTITY_NAME, "MemberAccount");
    assert_eq!(Member::PROPERTIES, &["id", "loginName"]);

    let member = Member {
        id: 9,
        login_name: "ada".to_string(),
        cached_display: "Ada".to_string(),
    };
    // A plain (non-Option) id always reads back as present.
    assert_eq!(member.id(), Some(9));

    let mut row = daokit::Row::new();
    row.set("id", 9i64.to_value());
    row.set("loginName", "ada".to_value());
    let restored = Member::from_row(&row).unwrap();
    assert_eq!(restored.login_name, "ada");
    // Skipped fields materialize from Default.
    assert_eq!(restored.cached_display, "");
}
