use std::sync::Arc;
use std::thread;

use dynsql::{DynSqlError, TypeRegistry, TypeTag, Value};

#[test]
fn test_property_discovery_from_accessor_pairs() {
    let registry = TypeRegistry::new();
    let member = registry
        .define("Member")
        .property("memberId", TypeTag::Integer)
        .property("memberName", TypeTag::Text)
        .boolean_property("active")
        .register()
        .unwrap();

    let metadata = registry.metadata(member).unwrap();
    assert_eq!(metadata.property_count(), 3);
    assert!(metadata.has_property("memberId"));
    assert!(metadata.has_property("memberid"));
    assert!(metadata.has_property("MEMBERNAME"));

    let active = metadata.get_property("active").unwrap();
    assert_eq!(active.tag(), TypeTag::Boolean);
    assert!(active.is_readable());
    assert!(active.is_writable());
}

#[test]
fn test_conflicting_accessor_types_drop_the_property() {
    let registry = TypeRegistry::new();
    let odd = registry
        .define("Odd")
        .getter("x", TypeTag::Text)
        .setter("x", TypeTag::Integer)
        .property("y", TypeTag::Long)
        .register()
        .unwrap();

    let metadata = registry.metadata(odd).unwrap();
    assert!(!metadata.has_property("x"));
    assert!(metadata.has_property("y"));
    assert!(matches!(
        metadata.get_property("x"),
        Err(DynSqlError::PropertyNotFound(_))
    ));
    // The accessor methods themselves are still reachable as methods.
    assert!(metadata.has_method("getX"));
    assert!(metadata.has_method("setX"));
}

#[test]
fn test_public_field_without_accessors_becomes_property() {
    let registry = TypeRegistry::new();
    let entity = registry
        .define("Entity")
        .field("memberStatusCode", TypeTag::Text)
        .hidden_field("internalRev", TypeTag::Long)
        .no_arg_constructor()
        .register()
        .unwrap();

    let metadata = registry.metadata(entity).unwrap();
    assert!(metadata.has_property("memberStatusCode"));
    // Hidden fields join the field map but never form a property alone.
    assert!(!metadata.has_property("internalRev"));
    assert!(metadata.has_field("internalRev"));

    let bean = registry.new_instance(entity, Vec::new()).unwrap();
    let property = metadata.get_property("memberStatusCode").unwrap();
    property.set_value(&bean, Value::from("FML")).unwrap();
    assert_eq!(property.get_value(&bean).unwrap(), Value::from("FML"));
}

#[test]
fn test_field_discovery_walks_superclass_and_interfaces() {
    let registry = TypeRegistry::new();
    let stamped = registry
        .define("Stamped")
        .interface()
        .field("stamp", TypeTag::Long)
        .register()
        .unwrap();
    let base = registry
        .define("BaseEntity")
        .field("version", TypeTag::Integer)
        .register()
        .unwrap();
    let entity = registry
        .define("Concrete")
        .extends(base)
        .implements(stamped)
        .field("version", TypeTag::Long)
        .register()
        .unwrap();

    let metadata = registry.metadata(entity).unwrap();
    // Own declaration wins over the inherited one.
    assert_eq!(metadata.get_field("version").unwrap().tag, TypeTag::Long);
    assert_eq!(metadata.get_field("stamp").unwrap().tag, TypeTag::Long);
    assert!(matches!(
        metadata.get_field("nothing"),
        Err(DynSqlError::FieldNotFound(_))
    ));
}

#[test]
fn test_suitable_constructor_with_numeric_coercion() {
    let registry = TypeRegistry::new();
    let member = registry
        .define("Member")
        .constructor(&[("memberId", TypeTag::Integer), ("memberName", TypeTag::Text)])
        .no_arg_constructor()
        .register()
        .unwrap();

    let metadata = registry.metadata(member).unwrap();

    // Strict pass.
    let bean = metadata
        .new_instance(&registry, vec![Value::Integer(3), Value::from("abc")])
        .unwrap();
    assert_eq!(bean.get_slot("memberId"), Some(Value::Integer(3)));

    // Coercion pass: a LONG and a numeric string both fit the INTEGER
    // parameter.
    let bean = metadata
        .new_instance(&registry, vec![Value::Long(9), Value::from("def")])
        .unwrap();
    assert_eq!(bean.get_slot("memberId"), Some(Value::Integer(9)));

    let bean = metadata
        .new_instance(&registry, vec![Value::from("42"), Value::from("ghi")])
        .unwrap();
    assert_eq!(bean.get_slot("memberId"), Some(Value::Integer(42)));

    // Nothing numeric about "abc": both passes fail.
    let err = metadata
        .new_instance(&registry, vec![Value::from("abc"), Value::from("x")])
        .unwrap_err();
    assert!(matches!(err, DynSqlError::ConstructorNotFound(_)));
}

#[test]
fn test_suitable_method_overload_resolution() {
    let registry = TypeRegistry::new();
    let calc = registry
        .define("Calc")
        .method("scale", &[TypeTag::Integer], Some(TypeTag::Integer), |_, args| {
            Ok(Value::Integer(args[0].to_integer().unwrap_or(0) * 10))
        })
        .method("scale", &[TypeTag::Text], Some(TypeTag::Text), |_, args| {
            Ok(Value::from(format!("x{}", args[0])))
        })
        .no_arg_constructor()
        .register()
        .unwrap();

    let metadata = registry.metadata(calc).unwrap();
    let bean = metadata.new_instance(&registry, Vec::new()).unwrap();

    // Strict match picks the TEXT overload for text.
    assert_eq!(
        metadata
            .invoke(&registry, &bean, "scale", vec![Value::from("a")])
            .unwrap(),
        Value::from("xa")
    );

    // A LONG has no strict match; coercion selects the first declared
    // overload that can claim it, converting in place.
    assert_eq!(
        metadata
            .invoke(&registry, &bean, "scale", vec![Value::Long(4)])
            .unwrap(),
        Value::Integer(40)
    );

    // Unknown name and arity misses are MethodNotFound.
    assert!(matches!(
        metadata.invoke(&registry, &bean, "shrink", vec![]),
        Err(DynSqlError::MethodNotFound(_))
    ));
    assert!(matches!(
        metadata.invoke(&registry, &bean, "scale", vec![]),
        Err(DynSqlError::MethodNotFound(_))
    ));
}

#[test]
fn test_purely_numeric_overloads_reject_non_numeric_argument() {
    let registry = TypeRegistry::new();
    let calc = registry
        .define("Strict")
        .method("twice", &[TypeTag::Integer], Some(TypeTag::Integer), |_, args| {
            Ok(Value::Integer(args[0].to_integer().unwrap_or(0) * 2))
        })
        .no_arg_constructor()
        .register()
        .unwrap();

    let metadata = registry.metadata(calc).unwrap();
    let bean = metadata.new_instance(&registry, Vec::new()).unwrap();

    assert_eq!(
        metadata
            .invoke(&registry, &bean, "twice", vec![Value::from("21")])
            .unwrap(),
        Value::Integer(42)
    );
    assert!(matches!(
        metadata.invoke(&registry, &bean, "twice", vec![Value::Boolean(true)]),
        Err(DynSqlError::MethodNotFound(_))
    ));
}

#[test]
fn test_exact_signature_lookup() {
    let registry = TypeRegistry::new();
    let member = registry
        .define("Member")
        .property("memberName", TypeTag::Text)
        .register()
        .unwrap();

    let metadata = registry.metadata(member).unwrap();
    assert!(metadata.get_method("getMemberName", &[]).is_ok());
    assert!(metadata.get_method("setMemberName", &[TypeTag::Text]).is_ok());
    assert!(matches!(
        metadata.get_method("setMemberName", &[TypeTag::Integer]),
        Err(DynSqlError::MethodNotFound(_))
    ));
}

#[test]
fn test_subclass_argument_is_assignable_to_superclass_parameter() {
    let registry = TypeRegistry::new();
    let base = registry.define("BaseMember").register().unwrap();
    let derived = registry
        .define("VipMember")
        .extends(base)
        .no_arg_constructor()
        .register()
        .unwrap();
    let holder = registry
        .define("Holder")
        .constructor(&[("member", TypeTag::Object(base))])
        .register()
        .unwrap();

    let vip = registry.new_instance(derived, Vec::new()).unwrap();
    let bean = registry
        .new_instance(holder, vec![Value::Bean(vip)])
        .unwrap();
    assert!(matches!(bean.get_slot("member"), Some(Value::Bean(_))));
}

#[test]
fn test_metadata_cache_is_idempotent() {
    let registry = TypeRegistry::new();
    let member = registry
        .define("Member")
        .property("memberName", TypeTag::Text)
        .register()
        .unwrap();

    let first = registry.metadata(member).unwrap();
    let second = registry.metadata(member).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_metadata_cache_under_concurrent_first_access() {
    let registry = Arc::new(TypeRegistry::new());
    let member = registry
        .define("Member")
        .property("memberId", TypeTag::Integer)
        .property("memberName", TypeTag::Text)
        .register()
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.metadata(member).unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let reference = registry.metadata(member).unwrap();
    for metadata in &results {
        // Every thread sees the same fully built entry.
        assert!(Arc::ptr_eq(metadata, &reference));
        assert_eq!(metadata.property_count(), 2);
    }
}

#[test]
fn test_metadata_build_failure_does_not_poison_other_types() {
    // A TypeId minted by a different registry can dangle; building
    // metadata over it must fail locally without touching other keys.
    let other = TypeRegistry::new();
    other.define("FillerA").register().unwrap();
    other.define("FillerB").register().unwrap();
    let foreign = other.define("Foreign").register().unwrap();

    let registry = TypeRegistry::new();
    let ok_type = registry
        .define("Fine")
        .property("name", TypeTag::Text)
        .register()
        .unwrap();
    let broken = registry
        .define("Broken")
        .extends(foreign)
        .register()
        .unwrap();

    assert!(registry.metadata(broken).is_err());
    assert!(registry.metadata(ok_type).is_ok());
    assert_eq!(registry.metadata(ok_type).unwrap().property_count(), 1);
}
