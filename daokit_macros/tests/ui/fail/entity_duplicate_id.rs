use daokit::Entity;

// Two identifier fields should trip the exactly-one check.
#[derive(Entity)]
struct TwoIds {
    #[orm(id)]
    first: Option<i64>,
    #[orm(id)]
    second: Option<i64>,
}

fn main() {}
