//! Integration tests for field-path access over registered object graphs

use fieldpath::{
    ClassBuilder, FieldPath, ObjectHandle, PropertyBag, Value, add_to_field, get_field_value,
    list_strategy_for, remove_from_field, set_field_value,
};
use pretty_assertions::assert_eq;
use std::sync::Once;

struct Address {
    city: Value,
}

struct Person {
    name: String,
    address: Value,
    tags: Value,
    extras: PropertyBag,
}

static REGISTER: Once = Once::new();

fn register_types() {
    REGISTER.call_once(|| {
        ClassBuilder::new("Address")
            .field::<Address, _, _>(
                "city",
                "String",
                |a| a.city.clone(),
                |a, v| {
                    a.city = v;
                    Ok(())
                },
            )
            .register();
        ClassBuilder::new("Person")
            .field::<Person, _, _>(
                "name",
                "String",
                |p| Value::from(p.name.clone()),
                |p, v| {
                    if let Value::Str(s) = v {
                        p.name = s;
                    }
                    Ok(())
                },
            )
            .field::<Person, _, _>(
                "address",
                "Address",
                |p| p.address.clone(),
                |p, v| {
                    p.address = v;
                    Ok(())
                },
            )
            .field::<Person, _, _>(
                "tags",
                "Set",
                |p| p.tags.clone(),
                |p, v| {
                    p.tags = v;
                    Ok(())
                },
            )
            .extensible::<Person, _, _>(
                |p, name| p.extras.get(name),
                |p, name, value| {
                    p.extras.put(name, value);
                    Ok(())
                },
            )
            .register();
    });
}

fn person(city: Option<&str>) -> Value {
    register_types();
    let address = match city {
        Some(c) => Value::Object(ObjectHandle::new(
            "Address",
            Address {
                city: Value::from(c),
            },
        )),
        None => Value::Null,
    };
    Value::Object(ObjectHandle::new(
        "Person",
        Person {
            name: "ada".into(),
            address,
            tags: Value::Null,
            extras: PropertyBag::new(),
        },
    ))
}

#[test]
fn dotted_path_round_trip() {
    let p = person(Some("london"));
    set_field_value(&p, "address.city", Value::from("paris")).unwrap();
    assert_eq!(
        get_field_value(&p, "address.city").unwrap(),
        Value::from("paris")
    );
}

#[test]
fn null_chain_reads_null_and_writes_nothing() {
    let p = person(None);
    assert_eq!(get_field_value(&p, "address.city").unwrap(), Value::Null);
    set_field_value(&p, "address.city", Value::from("nowhere")).unwrap();
    // the null link was not materialized by the write
    assert_eq!(get_field_value(&p, "address").unwrap(), Value::Null);
}

#[test]
fn unresolvable_segment_names_field_and_type() {
    let p = person(None);
    let err = get_field_value(&p, "nonexistent").unwrap_err();
    let text = err.to_string();
    assert!(text.contains("nonexistent"));
    assert!(text.contains("Person"));
}

#[test]
fn extensible_bag_serves_undeclared_names() {
    let p = person(None);
    set_field_value(&p, "nickname", Value::from("the-countess")).unwrap();
    assert_eq!(
        get_field_value(&p, "nickname").unwrap(),
        Value::from("the-countess")
    );
    // declared members still win over the bag
    assert_eq!(get_field_value(&p, "name").unwrap(), Value::from("ada"));
}

#[test]
fn property_bag_reads_absent_as_null() {
    register_types();
    let bag = PropertyBag::new().into_value();
    assert_eq!(get_field_value(&bag, "anything").unwrap(), Value::Null);
    set_field_value(&bag, "k", Value::Int(1)).unwrap();
    assert_eq!(get_field_value(&bag, "k").unwrap(), Value::Int(1));
}

#[test]
fn shared_path_alternates_between_types_correctly() {
    register_types();
    let bag = PropertyBag::new().into_value();
    set_field_value(&bag, "name", Value::from("bag-name")).unwrap();
    let p = person(None);
    let path = FieldPath::shared("name").unwrap();
    for _ in 0..3 {
        assert_eq!(path.get(&p).unwrap(), Value::from("ada"));
        assert_eq!(path.get(&bag).unwrap(), Value::from("bag-name"));
    }
}

#[test]
fn relationship_add_is_idempotent_on_set_backed_property() {
    let p = person(None);
    add_to_field(&p, "tags", Value::from("vip")).unwrap();
    add_to_field(&p, "tags", Value::from("vip")).unwrap();
    let tags = get_field_value(&p, "tags").unwrap();
    let list = list_strategy_for(&tags).unwrap();
    assert_eq!(list.size(&tags).unwrap(), 1);

    remove_from_field(&p, "tags", Value::from("vip")).unwrap();
    let tags = get_field_value(&p, "tags").unwrap();
    assert!(list.is_empty(&tags).unwrap());
}
