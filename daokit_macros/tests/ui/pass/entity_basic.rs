use daokit::{Entity, EntityDef, HasId, ToRow};

#[derive(Entity, Debug, Clone, PartialEq)]
struct Account {
    #[orm(id)]
    id: Option<i64>,
    email: String,
    active: bool,
}

fn main() {
    assert_eq!(Account::ENTITY_NAME, "Account");
    assert_eq!(Account::ID_PROPERTY, "id");
    assert_eq!(Account::PROPERTIES, &["id", "email", "active"]);

    let account = Account {
        id: None,
        email: "a@example.com".to_string(),
        active: true,
    };
    assert_eq!(account.id(), None);

    let row = account.to_row();
    assert!(row.contains("email"));
    assert!(row.contains("active"));
}
