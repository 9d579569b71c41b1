use factor_match::units::{convert, registry};
use factor_match::{FactorError, Quantity, QuantityRange};

fn range(sign: &str, expression: &str) -> QuantityRange {
    QuantityRange::read(sign, expression).unwrap()
}

// --- Reading quantities ---

#[test]
fn test_read_kinds() {
    assert!(matches!(Quantity::read("2000-01-01").unwrap(), Quantity::Date(_)));
    assert!(matches!(Quantity::read("42").unwrap(), Quantity::Int(42)));
    assert!(matches!(Quantity::read("2.5").unwrap(), Quantity::Float(_)));
    assert!(matches!(Quantity::read("30 miles per hour").unwrap(), Quantity::Unit(_)));
}

#[test]
fn test_read_unknown_unit() {
    let err = Quantity::read("12 furlongs of cheese").unwrap_err();
    assert!(matches!(err, FactorError::UnitConversion(_)), "got: {}", err);
}

#[test]
fn test_unknown_sign() {
    assert!(matches!(
        QuantityRange::read("=>", "5"),
        Err(FactorError::Construction(_))
    ));
}

// --- Conversion ---

#[test]
fn test_convert_between_units() {
    let meters = convert(100.0, "yards", "meters").unwrap();
    assert!((meters - 91.44).abs() < 1e-9);
    let mps = convert(1.0, "mph", "meter / second").unwrap();
    assert!((mps - 0.44704).abs() < 1e-9);
}

#[test]
fn test_convert_dimension_mismatch() {
    assert!(convert(1.0, "kilogram", "meter").is_err());
}

#[test]
fn test_registry_is_loaded_once() {
    let first = registry() as *const _;
    let second = registry() as *const _;
    assert_eq!(first, second);
    assert!(!registry().is_empty());
}

// --- Range relations ---

#[test]
fn test_numeric_ranges() {
    assert!(range(">", "10").implies(&range(">=", "5")));
    assert!(range("==", "3").implies(&range("!=", "5")));
    assert!(range("==", "5").contradicts(&range("!=", "5")));
    assert!(!range("<", "10").contradicts(&range(">", "5")));
    assert!(range("<=", "0").contradicts(&range(">", "0")));
}

#[test]
fn test_negation_complements() {
    let at_least = range(">=", "1 ounce");
    assert!(at_least.negated().means(&range("<", "1 ounce")));
    assert!(at_least.contradicts(&at_least.negated()));
}

#[test]
fn test_date_ranges() {
    assert!(range(">", "2000-01-01").implies(&range(">", "1990-06-15")));
    assert!(range("<", "1990-01-01").contradicts(&range(">=", "2000-01-01")));
}

#[test]
fn test_mixed_kinds_never_relate() {
    let date = range(">", "2000-01-01");
    let number = range(">", "5");
    assert!(!date.implies(&number));
    assert!(!date.contradicts(&number));
    assert!(!date.means(&number));
}

#[test]
fn test_unit_ranges_compare_after_conversion() {
    assert!(range("<", "1 kilometer").implies(&range("<", "1 mile")));
    assert!(range(">", "26000 pounds").contradicts(&range("<=", "3000 kilograms")));
    assert!(range("==", "1000 meters").means(&range("==", "1 kilometer")));
}
