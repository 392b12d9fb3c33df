use daokit::Projection;

#[derive(Projection)]
struct AuditBlock {
    created_at: String,
}

// Only one embedded parent shape is allowed.
#[derive(Projection)]
struct TwoParents {
    total: i64,
    #[projection(parent)]
    first: AuditBlock,
    #[projection(parent)]
    second: AuditBlock,
}

fn main() {}
