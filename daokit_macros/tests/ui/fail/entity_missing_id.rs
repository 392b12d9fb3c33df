use daokit::Entity;

// No #[orm(id)] field should trip the exactly-one check.
#[derive(Entity)]
struct NoId {
    name: String,
}

fn main() {}
