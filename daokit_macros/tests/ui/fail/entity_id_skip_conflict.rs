use daokit::Entity;

// A skipped field cannot carry the identifier marker.
#[derive(Entity)]
struct SkippedId {
    #[orm(id, skip)]
    id: Option<i64>,
    name: String,
}

fn main() {}
