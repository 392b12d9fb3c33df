use daokit::Entity;

// A misspelled attribute key surfaces as an invalid-attribute panic.
#[derive(Entity)]
struct Misspelled {
    #[orm(generated)]
    id: Option<i64>,
}

fn main() {}
