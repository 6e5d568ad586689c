use std::sync::Arc;

use dynsql::{DynSqlError, SqlEngine, TypeRegistry, TypeTag, Value};

fn engine() -> SqlEngine {
    SqlEngine::with_registry(Arc::new(TypeRegistry::new()))
}

#[test]
fn test_if_true_emits_branch() {
    let generated = engine()
        .generate(
            "select * from MEMBER/*IF id != null*/ where MEMBER_ID = /*id*/3/*END*/",
            &["id"],
            &[TypeTag::Integer],
            &[Value::Integer(12)],
        )
        .unwrap();
    assert_eq!(generated.sql, "select * from MEMBER where MEMBER_ID = ?");
    assert_eq!(generated.bind_values, vec![Value::Integer(12)]);
}

#[test]
fn test_if_false_emits_nothing() {
    let generated = engine()
        .generate(
            "select * from MEMBER/*IF id != null*/ where MEMBER_ID = /*id*/3/*END*/",
            &["id"],
            &[TypeTag::Integer],
            &[Value::Null],
        )
        .unwrap();
    assert_eq!(generated.sql, "select * from MEMBER");
    assert!(generated.bind_values.is_empty());
}

#[test]
fn test_if_else_block_form() {
    let sql = "select /*IF flag*/A/*ELSE*/B/*END*/ from DUAL";
    let truthy = engine()
        .generate(sql, &["flag"], &[TypeTag::Boolean], &[Value::Boolean(true)])
        .unwrap();
    assert_eq!(truthy.sql, "select A from DUAL");

    let falsy = engine()
        .generate(sql, &["flag"], &[TypeTag::Boolean], &[Value::Boolean(false)])
        .unwrap();
    assert_eq!(falsy.sql, "select B from DUAL");

    // NULL is falsy, so the else branch still applies.
    let nullish = engine()
        .generate(sql, &["flag"], &[TypeTag::Boolean], &[Value::Null])
        .unwrap();
    assert_eq!(nullish.sql, "select B from DUAL");
}

#[test]
fn test_if_else_line_form() {
    let sql = "select * from MEMBER where /*IF job != null*/JOB = /*job*/'CLERK'\n\
               -- ELSE JOB is null\n/*END*/";
    let with_job = engine()
        .generate(sql, &["job"], &[TypeTag::Text], &[Value::from("SALESMAN")])
        .unwrap();
    assert_eq!(with_job.sql, "select * from MEMBER where JOB = ?\n");
    assert_eq!(with_job.bind_values, vec![Value::from("SALESMAN")]);

    let without_job = engine()
        .generate(sql, &["job"], &[TypeTag::Text], &[Value::Null])
        .unwrap();
    assert_eq!(without_job.sql, "select * from MEMBER where JOB is null\n");
    assert!(without_job.bind_values.is_empty());
}

#[test]
fn test_boolean_connectives_and_not() {
    let sql = "select /*IF a && !b*/X/*ELSE*/Y/*END*/ from DUAL";
    let names = ["a", "b"];
    let tags = [TypeTag::Boolean, TypeTag::Boolean];

    let picked_x = engine()
        .generate(sql, &names, &tags, &[Value::Boolean(true), Value::Boolean(false)])
        .unwrap();
    assert_eq!(picked_x.sql, "select X from DUAL");

    let picked_y = engine()
        .generate(sql, &names, &tags, &[Value::Boolean(true), Value::Boolean(true)])
        .unwrap();
    assert_eq!(picked_y.sql, "select Y from DUAL");

    let or_sql = "select /*IF a || b*/X/*ELSE*/Y/*END*/ from DUAL";
    let or_hit = engine()
        .generate(or_sql, &names, &tags, &[Value::Boolean(false), Value::Boolean(true)])
        .unwrap();
    assert_eq!(or_hit.sql, "select X from DUAL");
}

#[test]
fn test_comparison_operators() {
    let sql = "select * from MEMBER/*IF age >= 20*/ where ADULT = 1/*END*/";
    let adult = engine()
        .generate(sql, &["age"], &[TypeTag::Integer], &[Value::Integer(25)])
        .unwrap();
    assert_eq!(adult.sql, "select * from MEMBER where ADULT = 1");

    let minor = engine()
        .generate(sql, &["age"], &[TypeTag::Integer], &[Value::Integer(15)])
        .unwrap();
    assert_eq!(minor.sql, "select * from MEMBER");

    // Ordering against NULL is false, not an error.
    let unknown = engine()
        .generate(sql, &["age"], &[TypeTag::Integer], &[Value::Null])
        .unwrap();
    assert_eq!(unknown.sql, "select * from MEMBER");
}

#[test]
fn test_nested_dotted_property_in_condition() {
    let registry = Arc::new(TypeRegistry::new());
    let member = registry
        .define("MemberPmb")
        .property("memberName", TypeTag::Text)
        .boolean_property("paging")
        .no_arg_constructor()
        .register()
        .unwrap();
    let pmb = registry.new_instance(member, Vec::new()).unwrap();
    pmb.set_slot("memberName", Value::from("abc"));
    pmb.set_slot("paging", Value::Boolean(false));

    let engine = SqlEngine::with_registry(registry);
    let generated = engine
        .generate(
            "select * from MEMBER/*IF pmb.memberName != null && !pmb.paging*/ \
             where MEMBER_NAME = /*pmb.memberName*/'x'/*END*/",
            &["pmb"],
            &[TypeTag::Object(member)],
            &[Value::Bean(pmb)],
        )
        .unwrap();
    assert_eq!(
        generated.sql,
        "select * from MEMBER where MEMBER_NAME = ?"
    );
    assert_eq!(generated.bind_values, vec![Value::from("abc")]);
    assert_eq!(generated.bind_tags, vec![TypeTag::Text]);
}

#[test]
fn test_nested_if() {
    let sql = "select * from MEMBER/*IF a != null*/ where A = /*a*/1\
               /*IF b != null*/ and B = /*b*/2/*END*//*END*/";
    let both = engine()
        .generate(
            sql,
            &["a", "b"],
            &[TypeTag::Integer, TypeTag::Integer],
            &[Value::Integer(1), Value::Integer(2)],
        )
        .unwrap();
    assert_eq!(both.sql, "select * from MEMBER where A = ? and B = ?");
    assert_eq!(
        both.bind_values,
        vec![Value::Integer(1), Value::Integer(2)]
    );

    let outer_only = engine()
        .generate(
            sql,
            &["a", "b"],
            &[TypeTag::Integer, TypeTag::Integer],
            &[Value::Integer(1), Value::Null],
        )
        .unwrap();
    assert_eq!(outer_only.sql, "select * from MEMBER where A = ?");
}

#[test]
fn test_incompatible_comparison_is_reported() {
    let err = engine()
        .generate(
            "select * from MEMBER/*IF name > 3*/ where 1=1/*END*/",
            &["name"],
            &[TypeTag::Text],
            &[Value::from("abc")],
        )
        .unwrap_err();
    let DynSqlError::ExpressionEvaluation(msg) = err else {
        panic!("expected expression evaluation error");
    };
    assert!(msg.contains("TEXT and INTEGER"));
}

#[test]
fn test_unknown_variable_in_condition_is_reported() {
    let err = engine()
        .generate("select /*IF ghost*/X/*END*/ from DUAL", &[], &[], &[])
        .unwrap_err();
    assert!(matches!(err, DynSqlError::ExpressionEvaluation(_)));
}

#[test]
fn test_method_call_condition() {
    let sql = "select * from MEMBER/*IF names.isEmpty()*/ where 1=0/*END*/";
    let empty = engine()
        .generate(sql, &["names"], &[TypeTag::List], &[Value::List(vec![])])
        .unwrap();
    assert_eq!(empty.sql, "select * from MEMBER where 1=0");

    let filled = engine()
        .generate(
            sql,
            &["names"],
            &[TypeTag::List],
            &[Value::List(vec![Value::from("a")])],
        )
        .unwrap();
    assert_eq!(filled.sql, "select * from MEMBER");
}
