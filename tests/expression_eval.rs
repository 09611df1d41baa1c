//! Integration tests for end-to-end expression evaluation

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::Once;

use fieldpath::{
    ClassBuilder, CustomNumericOps, ExprEngine, FieldPathError, ObjectHandle, Value, evaluate,
    register_numeric_ops,
};
use fieldpath::{Result, SparseArray};
use pretty_assertions::assert_eq;
use rstest::rstest;
use rust_decimal::Decimal;

struct Item {
    name: String,
    price: i64,
}

struct Money {
    cents: i64,
}

struct MoneyOps;

impl MoneyOps {
    fn cents_of(value: &Value) -> Result<i64> {
        match value {
            Value::Null => Ok(0),
            Value::Object(h) if h.type_name() == "Money" => h
                .with_downcast_ref::<Money, _>(|m| m.cents)
                .ok_or_else(|| FieldPathError::Type {
                    message: "Money handle without Money payload".into(),
                }),
            Value::Byte(n) => Ok(*n as i64 * 100),
            Value::Short(n) => Ok(*n as i64 * 100),
            Value::Int(n) => Ok(*n as i64 * 100),
            Value::Long(n) => Ok(*n * 100),
            other => Err(FieldPathError::Type {
                message: format!("cannot treat {} as money", other.type_name()),
            }),
        }
    }

    fn money(cents: i64) -> Value {
        Value::Object(ObjectHandle::new("Money", Money { cents }))
    }
}

impl CustomNumericOps for MoneyOps {
    fn add(&self, left: &Value, right: &Value) -> Result<Value> {
        Ok(Self::money(Self::cents_of(left)? + Self::cents_of(right)?))
    }

    fn subtract(&self, left: &Value, right: &Value) -> Result<Value> {
        Ok(Self::money(Self::cents_of(left)? - Self::cents_of(right)?))
    }

    fn multiply(&self, left: &Value, right: &Value) -> Result<Value> {
        // money * scalar, either side
        let (cents, factor) = if matches!(left, Value::Object(_)) {
            (Self::cents_of(left)?, Self::cents_of(right)? / 100)
        } else {
            (Self::cents_of(right)?, Self::cents_of(left)? / 100)
        };
        Ok(Self::money(cents * factor))
    }

    fn divide(&self, left: &Value, right: &Value) -> Result<Value> {
        let divisor = Self::cents_of(right)? / 100;
        if divisor == 0 {
            return Err(FieldPathError::Arithmetic {
                message: "division by zero".into(),
            });
        }
        Ok(Self::money(Self::cents_of(left)? / divisor))
    }

    fn compare(&self, left: &Value, right: &Value) -> Result<Ordering> {
        Ok(Self::cents_of(left)?.cmp(&Self::cents_of(right)?))
    }
}

static REGISTER: Once = Once::new();

fn setup() {
    REGISTER.call_once(|| {
        ClassBuilder::new("Item")
            .readonly_field::<Item, _>("name", "String", |i| Value::from(i.name.clone()))
            .readonly_field::<Item, _>("price", "Long", |i| Value::Long(i.price))
            .register();
        ClassBuilder::new("Order")
            .readonly_field::<Catalog, _>("items", "Sequence", |c| c.items.clone())
            .register();
        register_numeric_ops("Money", Arc::new(MoneyOps));
    });
}

struct Catalog {
    items: Value,
}

fn catalog() -> Value {
    setup();
    let items = Value::sequence(
        [
            ("anvil", 140),
            ("feather", 2),
            ("piano", 900),
            ("nail", 1),
            ("rope", 32),
        ]
            .into_iter()
            .map(|(name, price)| {
                Value::Object(ObjectHandle::new(
                    "Item",
                    Item {
                        name: name.into(),
                        price,
                    },
                ))
            })
            .collect(),
    );
    Value::Object(ObjectHandle::new("Order", Catalog { items }))
}

#[test]
fn find_all_collect_preserves_order() {
    let root = catalog();
    let names = evaluate("items.findAll(price > 100).collect(name)", &root).unwrap();
    assert_eq!(
        names,
        Value::sequence(vec![Value::from("anvil"), Value::from("piano")])
    );
}

#[test]
fn find_returns_first_match_or_null() {
    let root = catalog();
    let found = evaluate("items.find(price > 500)", &root).unwrap();
    let Value::Object(h) = &found else {
        panic!("expected an item");
    };
    assert_eq!(h.type_name(), "Item");
    assert_eq!(
        evaluate("items.find(price > 500).name", &root).unwrap(),
        Value::from("piano")
    );
    assert_eq!(
        evaluate("items.find(price > 10000)", &root).unwrap(),
        Value::Null
    );
}

#[test]
fn sum_avg_min_max_over_projected_values() {
    let root = catalog();
    assert_eq!(
        evaluate("items.sum(price)", &root).unwrap(),
        Value::Long(1075)
    );
    assert_eq!(
        evaluate("items.min(price)", &root).unwrap(),
        Value::Long(1)
    );
    assert_eq!(
        evaluate("items.max(price)", &root).unwrap(),
        Value::Long(900)
    );
    // 1075 / 5 in long division
    assert_eq!(
        evaluate("items.avg(price)", &root).unwrap(),
        Value::Long(215)
    );
}

#[rstest]
#[case("1 + 2L", Value::Long(3))]
#[case("1H + 1.5", Value::Decimal(Decimal::try_from(2.5).unwrap()))]
#[case("10B / 4B", Value::Decimal(Decimal::try_from(2.5).unwrap()))]
#[case("1 + 'a'", Value::from("1a"))]
#[case("null + 5", Value::Int(5))]
#[case("null + null", Value::Null)]
#[case("7 % 4", Value::Int(3))]
#[case("2.5F + 1", Value::Float(3.5))]
fn numeric_promotion_table(#[case] expression: &str, #[case] expected: Value) {
    setup();
    assert_eq!(evaluate(expression, &Value::Null).unwrap(), expected);
}

#[test]
fn dynamic_subscripts_over_five_elements() {
    setup();
    let root = catalog();
    let items = fieldpath::get_field_value(&root, "items").unwrap();
    let engine = ExprEngine::new();
    let first = engine.evaluate("items[^].name", &root).unwrap();
    assert_eq!(first, Value::from("anvil"));
    let mid = engine.evaluate("items[~].name", &root).unwrap();
    assert_eq!(mid, Value::from("piano"));
    let last = engine.evaluate("items[$].name", &root).unwrap();
    assert_eq!(last, Value::from("rope"));

    let all = engine.evaluate("items[*]", &root).unwrap();
    assert_eq!(all, items);
    assert!(!all.identity_eq(&items));

    // concrete out-of-range reads are null
    assert_eq!(engine.evaluate("items[99]", &root).unwrap(), Value::Null);
}

#[test]
fn casts_follow_the_silent_null_contract() {
    setup();
    assert_eq!(
        evaluate("'oops' as Long", &Value::Null).unwrap(),
        Value::Null
    );
    assert_eq!(evaluate("3 as Long", &Value::Null).unwrap(), Value::Long(3));
    assert_eq!(
        evaluate("2.9 as Int", &Value::Null).unwrap(),
        Value::Int(2)
    );
}

#[test]
fn money_flows_through_sum_and_avg() {
    setup();
    let wallet = Value::sequence(vec![
        MoneyOps::money(150),
        MoneyOps::money(250),
        MoneyOps::money(200),
    ]);
    let engine = ExprEngine::new();

    let total = engine.evaluate("sum()", &wallet).unwrap();
    assert_eq!(MoneyOps::cents_of(&total).unwrap(), 600);
    let Value::Object(h) = &total else {
        panic!("sum of money must stay money");
    };
    assert_eq!(h.type_name(), "Money");

    // averaging money produces money, not a plain number
    let average = engine.evaluate("avg()", &wallet).unwrap();
    assert_eq!(MoneyOps::cents_of(&average).unwrap(), 200);

    let cheap = engine.evaluate("findAll($this < 2)", &wallet).unwrap();
    let cheap_count = engine.evaluate("size()", &cheap).unwrap();
    assert_eq!(cheap_count, Value::Long(1));
}

#[test]
fn variables_and_statics_resolve_through_the_context() {
    setup();
    let engine = ExprEngine::new();
    let bag = fieldpath::PropertyBag::new().into_value();
    fieldpath::set_field_value(&bag, "base", Value::Int(32)).unwrap();

    let mut ctx = engine.context_for(bag);
    ctx.set_variable("limit", Value::Int(10));
    ctx.symbols_mut()
        .register_static("Config", "BASE", Value::Int(5));

    let ast = fieldpath::parse_expression("$limit + base").unwrap();
    let total = engine.evaluate_with_context(&ast, &mut ctx).unwrap();
    assert_eq!(total, Value::Int(42));

    let stat = fieldpath::parse_expression("@Config.BASE * 2").unwrap();
    let doubled = engine.evaluate_with_context(&stat, &mut ctx).unwrap();
    assert_eq!(doubled, Value::Int(10));

    // clearing the context drops variables and statics
    ctx.clear();
    assert!(engine.evaluate_with_context(&stat, &mut ctx).is_err());
}

#[test]
fn sparse_arrays_participate_in_expressions() {
    setup();
    let sparse = SparseArray::from_slots(vec![
        Value::Null,
        Value::Int(7),
        Value::Null,
        Value::Int(9),
    ])
    .into_value();
    let engine = ExprEngine::new();
    assert_eq!(engine.evaluate("first()", &sparse).unwrap(), Value::Int(7));
    assert_eq!(
        engine.evaluate("$this[$]", &sparse).unwrap(),
        Value::Int(9)
    );
}
