use std::path::Path;

use factor_match::fact_file::{
    dump_factor, load_fact_file, load_fact_file_str, load_factor_str, RawFactor,
};
use factor_match::{Assertion, ContextRegister, Entity, Factor, Predicate, QuantityRange, Statement};

fn e(name: &str) -> Factor {
    Entity::new(name).into()
}

fn reload(factor: &Factor) -> Factor {
    let yaml = dump_factor(factor).unwrap();
    load_factor_str(&yaml).unwrap()
}

// --- Round trips ---

#[test]
fn test_treaties_round_trip_keeps_relations() {
    let index = load_fact_file(Path::new("data/treaties.yaml")).unwrap();
    let nafta = reload(index.get("nafta").unwrap());
    let brexit = reload(index.get("brexit").unwrap());

    assert_eq!(&nafta, index.get("nafta").unwrap());
    assert_eq!(nafta.explanations_contradiction(&brexit, None).count(), 4);
    let usa_like_uk = ContextRegister::from_lists(&[e("USA")], &[e("UK")]).unwrap();
    assert_eq!(nafta.explanations_contradiction(&brexit, Some(&usa_like_uk)).count(), 2);
}

#[test]
fn test_comparison_round_trip() {
    let range = QuantityRange::read(">=", "100 miles per hour").unwrap();
    let fast: Factor = Statement::new(
        Predicate::with_range("${vehicle}'s speed was", range).unwrap(),
        vec![e("the car")],
    )
    .unwrap()
    .into();
    let reloaded = reload(&fast);
    assert!(reloaded.means(&fast, None));
    assert_eq!(reloaded.to_string(), fast.to_string());
}

#[test]
fn test_date_comparison_round_trip() {
    let range = QuantityRange::read("<", "1990-01-01").unwrap();
    let early: Factor = Statement::new(
        Predicate::with_range("the date $treaty was signed was", range).unwrap(),
        vec![e("the treaty")],
    )
    .unwrap()
    .into();
    assert_eq!(reload(&early), early);
}

#[test]
fn test_assertion_round_trip() {
    let statement = Statement::new(
        Predicate::new("$defendant was guilty").with_truth(false),
        vec![e("Alice")],
    )
    .unwrap()
    .with_name("innocence");
    let assertion: Factor = Assertion::new(statement, Some(Entity::specific("the jury")))
        .with_absent(true)
        .into();
    let reloaded = reload(&assertion);
    assert_eq!(reloaded, assertion);
    assert_eq!(reloaded.to_string(), assertion.to_string());
}

#[test]
fn test_raw_factor_shape() {
    let factor: Factor = Statement::new(
        Predicate::new("$person was a pilot"),
        vec![Entity::specific("Amelia Earhart").plural().into()],
    )
    .unwrap()
    .into();
    match RawFactor::from_factor(&factor) {
        RawFactor::Statement { terms, absent, .. } => {
            assert!(!absent);
            assert_eq!(
                terms,
                vec![RawFactor::Entity {
                    name: "Amelia Earhart".to_string(),
                    generic: false,
                    plural: true,
                }]
            );
        }
        other => panic!("expected a statement, got {:?}", other),
    }
}

// --- Documents written by hand ---

#[test]
fn test_hand_written_document() {
    let yaml = r#"
factors:
  fast:
    type: statement
    predicate:
      content: ${vehicle}'s speed was
      sign: ">"
      expression: 55 miles per hour
    terms:
      - type: entity
        name: the pickup
  slow:
    type: statement
    predicate:
      content: ${vehicle}'s speed was
      sign: "<"
      expression: 30
    terms:
      - type: entity
        name: the car
  unsure:
    type: statement
    predicate:
      content: $person had a farm
      truth: null
    terms:
      - type: entity
        name: Old MacDonald
"#;
    let index = load_fact_file_str(yaml).unwrap();
    assert_eq!(index.keys().collect::<Vec<_>>(), vec!["fast", "slow", "unsure"]);
    let fast = index.get("fast").unwrap();
    let slow = index.get("slow").unwrap();
    // A plain number and a speed have no defined relation.
    assert!(!fast.contradicts(slow, None));
    assert_eq!(
        index.get("unsure").unwrap().to_string(),
        "the statement whether <Old MacDonald> had a farm"
    );
}

#[test]
fn test_group_with_entity_member_rejected() {
    let yaml = r#"
factors:
  bad:
    type: group
    members:
      - type: entity
        name: Alice
"#;
    let err_msg = load_fact_file_str(yaml).unwrap_err().to_string();
    assert!(err_msg.contains("bad"), "got: {}", err_msg);
}
