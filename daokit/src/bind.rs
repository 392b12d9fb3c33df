//! Parameter binding against compiled query handles.

use daokit_core::{Binding, NamedOrder, OrmError, OrmResult, QueryHandle, Value};

/// Applies a binding set to a compiled handle.
///
/// Positional values against a query without named parameters bind to
/// slots `0..n` left to right. Against a query that declares named
/// parameters, the default [`NamedOrder::TailFirst`] keeps the
/// long-standing rule: parameters are walked in declaration order while
/// a cursor walks the values backwards from index `declared - 1`, so
/// with parameters `:a, :b, :c` and values `[1, 2, 3]` the result is
/// `a=3, b=2, c=1`. Values past the declared count (the tail of the
/// list) are never read; fewer values than parameters is a
/// [`OrmError::BindingMismatch`]. Nothing here auto-corrects the order;
/// [`NamedOrder::Declared`] is the opt-in straightforward pairing.
pub fn bind_parameters<H: QueryHandle>(
    handle: &mut H,
    binding: &Binding,
    order: NamedOrder,
) -> OrmResult<()> {
    match binding {
        Binding::None => Ok(()),
        Binding::Positional(values) => bind_positional(handle, values, order),
        Binding::Named(entries) => {
            for (name, value) in entries {
                handle.bind_name(name, value.clone())?;
            }
            Ok(())
        }
    }
}

fn bind_positional<H: QueryHandle>(
    handle: &mut H,
    values: &[Value],
    order: NamedOrder,
) -> OrmResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    let names = handle.named_parameters();
    if names.is_empty() {
        for (index, value) in values.iter().enumerate() {
            handle.bind_index(index, value.clone())?;
        }
        return Ok(());
    }
    if values.len() < names.len() {
        return Err(OrmError::binding(format!(
            "{} positional values for {} named parameters",
            values.len(),
            names.len()
        )));
    }
    match order {
        NamedOrder::TailFirst => {
            // The cursor starts at the parameter count, not the value
            // count, so surplus values at the tail are never read.
            let mut at = names.len();
            for name in &names {
                at -= 1;
                handle.bind_name(name, values[at].clone())?;
            }
        }
        NamedOrder::Declared => {
            for (name, value) in names.iter().zip(values.iter()) {
                handle.bind_name(name, value.clone())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use daokit_core::{
        async_trait, Order, OrmResult, Restriction, Row, RowTransform, ScalarKind, Window,
    };

    /// Handle double that records binds and reports a fixed set of
    /// declared named parameters.
    struct FakeHandle {
        declared: Vec<String>,
        by_name: Vec<(String, Value)>,
        by_index: Vec<(usize, Value)>,
    }

    impl FakeHandle {
        fn with_named(declared: &[&str]) -> Self {
            Self {
                declared: declared.iter().map(|s| s.to_string()).collect(),
                by_name: Vec::new(),
                by_index: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl QueryHandle for FakeHandle {
        fn named_parameters(&self) -> Vec<String> {
            self.declared.clone()
        }

        fn bind_index(&mut self, index: usize, value: Value) -> OrmResult<()> {
            self.by_index.push((index, value));
            Ok(())
        }

        fn bind_name(&mut self, name: &str, value: Value) -> OrmResult<()> {
            self.by_name.push((name.to_string(), value));
            Ok(())
        }

        fn window(&mut self, _window: Window) {}
        fn add_scalar(&mut self, _column: &str, _kind: ScalarKind) {}
        fn add_entity(&mut self, _alias: &str, _entity: &str) {}
        fn transform(&mut self, _transform: RowTransform) {}
        fn add_restriction(&mut self, _restriction: Restriction) {}
        fn add_order(&mut self, _order: Order) {}

        async fn rows(&mut self) -> OrmResult<Vec<Row>> {
            Ok(Vec::new())
        }

        async fn unique(&mut self) -> OrmResult<Option<Row>> {
            Ok(None)
        }

        async fn update_count(&mut self) -> OrmResult<u64> {
            Ok(0)
        }
    }

    #[test]
    fn tail_first_reverses_value_consumption() {
        let mut handle = FakeHandle::with_named(&["a", "b", "c"]);
        let binding = Binding::positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        bind_parameters(&mut handle, &binding, NamedOrder::TailFirst).unwrap();
        assert_eq!(
            handle.by_name,
            vec![
                ("a".to_string(), Value::Int(3)),
                ("b".to_string(), Value::Int(2)),
                ("c".to_string(), Value::Int(1)),
            ]
        );
    }

    #[test]
    fn tail_first_ignores_surplus_values_past_the_declared_count() {
        let mut handle = FakeHandle::with_named(&["a", "b"]);
        let binding = Binding::positional(vec![Value::Int(1), Value::Int(2), Value::Int(9)]);
        bind_parameters(&mut handle, &binding, NamedOrder::TailFirst).unwrap();
        assert_eq!(
            handle.by_name,
            vec![
                ("a".to_string(), Value::Int(2)),
                ("b".to_string(), Value::Int(1)),
            ]
        );
    }

    #[test]
    fn too_few_values_is_a_binding_mismatch() {
        let mut handle = FakeHandle::with_named(&["a", "b", "c"]);
        let binding = Binding::positional(vec![Value::Int(1)]);
        let err = bind_parameters(&mut handle, &binding, NamedOrder::TailFirst)
            .expect_err("underflow must not bind");
        assert!(matches!(err, OrmError::BindingMismatch { .. }));
        assert!(handle.by_name.is_empty());
    }

    #[test]
    fn declared_order_pairs_left_to_right() {
        let mut handle = FakeHandle::with_named(&["a", "b", "c"]);
        let binding = Binding::positional(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        bind_parameters(&mut handle, &binding, NamedOrder::Declared).unwrap();
        assert_eq!(
            handle.by_name,
            vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Int(2)),
                ("c".to_string(), Value::Int(3)),
            ]
        );
    }

    #[test]
    fn positional_query_binds_slots_in_order() {
        let mut handle = FakeHandle::with_named(&[]);
        let binding = Binding::positional(vec![Value::Int(7), Value::Int(8)]);
        bind_parameters(&mut handle, &binding, NamedOrder::TailFirst).unwrap();
        assert_eq!(
            handle.by_index,
            vec![(0, Value::Int(7)), (1, Value::Int(8))]
        );
    }

    #[test]
    fn empty_bindings_are_a_no_op() {
        let mut handle = FakeHandle::with_named(&["a"]);
        bind_parameters(&mut handle, &Binding::None, NamedOrder::TailFirst).unwrap();
        bind_parameters(
            &mut handle,
            &Binding::positional(Vec::new()),
            NamedOrder::TailFirst,
        )
        .unwrap();
        assert!(handle.by_name.is_empty());
        assert!(handle.by_index.is_empty());
    }

    #[test]
    fn named_entries_bind_by_name() {
        let mut handle = FakeHandle::with_named(&["a", "b"]);
        let binding = Binding::named(vec![
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(1)),
        ]);
        bind_parameters(&mut handle, &binding, NamedOrder::TailFirst).unwrap();
        assert_eq!(
            handle.by_name,
            vec![
                ("b".to_string(), Value::Int(2)),
                ("a".to_string(), Value::Int(1)),
            ]
        );
    }
}
