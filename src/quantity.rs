use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::types::{FactorError, Result};
use crate::units::{registry, UnitQuantity};

// ---------------------------------------------------------------------------
// Sign
// ---------------------------------------------------------------------------

/// Comparison operator between a described quantity and a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Sign {
    /// Canonical operator text (`"=="`, `">="`, ...).
    pub fn symbol(&self) -> &'static str {
        match self {
            Sign::Eq => "==",
            Sign::Ne => "!=",
            Sign::Gt => ">",
            Sign::Ge => ">=",
            Sign::Lt => "<",
            Sign::Le => "<=",
        }
    }

    /// The sign covering exactly the numbers this one excludes.
    pub fn opposite(&self) -> Sign {
        match self {
            Sign::Eq => Sign::Ne,
            Sign::Ne => Sign::Eq,
            Sign::Gt => Sign::Le,
            Sign::Le => Sign::Gt,
            Sign::Ge => Sign::Lt,
            Sign::Lt => Sign::Ge,
        }
    }

    /// English phrase used when rendering a comparison.
    pub fn phrase(&self) -> &'static str {
        match self {
            Sign::Eq => "exactly equal to",
            Sign::Ne => "not equal to",
            Sign::Gt => "greater than",
            Sign::Lt => "less than",
            Sign::Ge => "at least",
            Sign::Le => "no more than",
        }
    }
}

impl FromStr for Sign {
    type Err = FactorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "==" | "=" => Ok(Sign::Eq),
            "!=" | "<>" => Ok(Sign::Ne),
            ">" => Ok(Sign::Gt),
            ">=" => Ok(Sign::Ge),
            "<" => Ok(Sign::Lt),
            "<=" => Ok(Sign::Le),
            other => Err(FactorError::Construction(format!(
                "sign must be one of ==, !=, >, >=, <, <=; got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// The constant a comparison is made against.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Int(i64),
    Float(f64),
    Unit(UnitQuantity),
    Date(NaiveDate),
}

impl Quantity {
    /// Read a quantity from text: an ISO date, an integer, a decimal
    /// number, or a magnitude with units understood by the unit registry.
    pub fn read(expression: &str) -> Result<Quantity> {
        let text = expression.trim();

        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Ok(Quantity::Date(date));
        }
        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            return text.parse::<i64>().map(Quantity::Int).map_err(|e| {
                FactorError::Construction(format!("integer '{}' out of range: {}", text, e))
            });
        }
        if let Some((whole, fraction)) = text.split_once('.') {
            let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
            if numeric(whole) && numeric(fraction) {
                if let Ok(value) = text.parse::<f64>() {
                    return Ok(Quantity::Float(value));
                }
            }
        }
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Quantity::Int(value));
        }
        if let Ok(value) = text.parse::<f64>() {
            if value.is_finite() {
                return Ok(Quantity::Float(value));
            }
        }
        registry().parse_quantity(text).map(Quantity::Unit)
    }

    /// Position of the quantity on the number line. Dates map to YYYYMMDD,
    /// which preserves their order.
    pub fn magnitude(&self) -> f64 {
        match self {
            Quantity::Int(n) => *n as f64,
            Quantity::Float(x) => *x,
            Quantity::Unit(q) => q.magnitude,
            Quantity::Date(d) => {
                (d.year() as f64) * 10_000.0 + (d.month() as f64) * 100.0 + d.day() as f64
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Quantity::Int(_) | Quantity::Float(_) => "number",
            Quantity::Unit(_) => "unit quantity",
            Quantity::Date(_) => "date",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Int(n) => write!(f, "{}", n),
            Quantity::Float(x) => write!(f, "{}", x),
            Quantity::Unit(q) => write!(f, "{}", q),
            Quantity::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Quantity {
    fn from(n: i64) -> Self {
        Quantity::Int(n)
    }
}

impl From<i32> for Quantity {
    fn from(n: i32) -> Self {
        Quantity::Int(n as i64)
    }
}

impl From<f64> for Quantity {
    fn from(x: f64) -> Self {
        Quantity::Float(x)
    }
}

impl From<NaiveDate> for Quantity {
    fn from(d: NaiveDate) -> Self {
        Quantity::Date(d)
    }
}

impl From<UnitQuantity> for Quantity {
    fn from(q: UnitQuantity) -> Self {
        Quantity::Unit(q)
    }
}

// ---------------------------------------------------------------------------
// Interval sets
// ---------------------------------------------------------------------------

fn approx_eq(a: f64, b: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    a == b || (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bound {
    value: f64,
    closed: bool,
}

impl Bound {
    fn open(value: f64) -> Self {
        Bound { value, closed: false }
    }

    fn closed(value: f64) -> Self {
        Bound { value, closed: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Span {
    lo: Bound,
    hi: Bound,
}

impl Span {
    fn is_empty(&self) -> bool {
        if approx_eq(self.lo.value, self.hi.value) {
            !(self.lo.closed && self.hi.closed) || self.lo.value.is_infinite()
        } else {
            self.lo.value > self.hi.value
        }
    }

    fn intersect(&self, other: &Span) -> Span {
        let lo = if approx_eq(self.lo.value, other.lo.value) {
            Bound { value: self.lo.value, closed: self.lo.closed && other.lo.closed }
        } else if self.lo.value > other.lo.value {
            self.lo
        } else {
            other.lo
        };
        let hi = if approx_eq(self.hi.value, other.hi.value) {
            Bound { value: self.hi.value, closed: self.hi.closed && other.hi.closed }
        } else if self.hi.value < other.hi.value {
            self.hi
        } else {
            other.hi
        };
        Span { lo, hi }
    }

    fn within(&self, other: &Span) -> bool {
        let lo_ok = if approx_eq(self.lo.value, other.lo.value) {
            other.lo.closed || !self.lo.closed
        } else {
            other.lo.value < self.lo.value
        };
        let hi_ok = if approx_eq(self.hi.value, other.hi.value) {
            other.hi.closed || !self.hi.closed
        } else {
            self.hi.value < other.hi.value
        };
        lo_ok && hi_ok
    }

    fn scaled(&self, scalar: f64) -> Span {
        Span {
            lo: Bound { value: self.lo.value * scalar, closed: self.lo.closed },
            hi: Bound { value: self.hi.value * scalar, closed: self.hi.closed },
        }
    }
}

/// A finite union of disjoint intervals on the real line.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSet {
    spans: Vec<Span>,
}

impl IntervalSet {
    fn new(spans: Vec<Span>) -> Self {
        IntervalSet {
            spans: spans.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut spans = Vec::new();
        for mine in &self.spans {
            for theirs in &other.spans {
                spans.push(mine.intersect(theirs));
            }
        }
        IntervalSet::new(spans)
    }

    /// True if every point of `self` lies in `other`.
    pub fn is_subset(&self, other: &IntervalSet) -> bool {
        self.spans
            .iter()
            .all(|mine| other.spans.iter().any(|theirs| mine.within(theirs)))
    }

    /// Multiply every bound by a positive scalar.
    pub fn scaled(&self, scalar: f64) -> IntervalSet {
        IntervalSet::new(self.spans.iter().map(|s| s.scaled(scalar)).collect())
    }

    pub fn contains(&self, value: f64) -> bool {
        let point = Span { lo: Bound::closed(value), hi: Bound::closed(value) };
        self.spans.iter().any(|s| point.within(s))
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.spans.is_empty() {
            return write!(f, "∅");
        }
        let parts: Vec<String> = self
            .spans
            .iter()
            .map(|s| {
                if s.lo.closed && s.hi.closed && approx_eq(s.lo.value, s.hi.value) {
                    return format!("{{{}}}", s.lo.value);
                }
                format!(
                    "{}{}, {}{}",
                    if s.lo.closed { '[' } else { '(' },
                    s.lo.value,
                    s.hi.value,
                    if s.hi.closed { ']' } else { ')' }
                )
            })
            .collect();
        write!(f, "{}", parts.join(" ∪ "))
    }
}

// ---------------------------------------------------------------------------
// QuantityRange
// ---------------------------------------------------------------------------

/// The set of values a comparison admits: a sign applied to a quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityRange {
    quantity: Quantity,
    sign: Sign,
    include_negatives: bool,
}

impl QuantityRange {
    /// `include_negatives` defaults to whether the quantity itself is negative.
    pub fn new(quantity: Quantity, sign: Sign) -> Self {
        let include_negatives = quantity.magnitude() < 0.0;
        QuantityRange { quantity, sign, include_negatives }
    }

    pub fn with_include_negatives(mut self, include_negatives: bool) -> Self {
        self.include_negatives = include_negatives;
        self
    }

    /// Build a range from a sign string and an expression to be read with
    /// [`Quantity::read`].
    pub fn read(sign: &str, expression: &str) -> Result<Self> {
        Ok(QuantityRange::new(Quantity::read(expression)?, sign.parse()?))
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn include_negatives(&self) -> bool {
        self.include_negatives
    }

    pub fn magnitude(&self) -> f64 {
        self.quantity.magnitude()
    }

    /// The complementary range: same quantity, opposite sign.
    pub fn negated(&self) -> QuantityRange {
        QuantityRange { sign: self.sign.opposite(), ..self.clone() }
    }

    fn lower_bound(&self) -> Bound {
        if self.include_negatives {
            Bound::open(f64::NEG_INFINITY)
        } else {
            Bound::closed(0.0)
        }
    }

    /// The values this range covers, in its own units.
    pub fn interval(&self) -> IntervalSet {
        let m = self.magnitude();
        let infinity = Bound::open(f64::INFINITY);
        let spans = match self.sign {
            Sign::Eq => vec![Span { lo: Bound::closed(m), hi: Bound::closed(m) }],
            Sign::Gt => vec![Span { lo: Bound::open(m), hi: infinity }],
            Sign::Ge => vec![Span { lo: Bound::closed(m), hi: infinity }],
            Sign::Lt => vec![Span { lo: self.lower_bound(), hi: Bound::open(m) }],
            Sign::Le => vec![Span { lo: self.lower_bound(), hi: Bound::closed(m) }],
            Sign::Ne => vec![
                Span { lo: self.lower_bound(), hi: Bound::open(m) },
                Span { lo: Bound::open(m), hi: infinity },
            ],
        };
        IntervalSet::new(spans)
    }

    /// `other`'s interval expressed in this range's units.
    pub fn converted_interval(&self, other: &QuantityRange) -> Result<IntervalSet> {
        match (&self.quantity, &other.quantity) {
            (
                Quantity::Int(_) | Quantity::Float(_),
                Quantity::Int(_) | Quantity::Float(_),
            )
            | (Quantity::Date(_), Quantity::Date(_)) => Ok(other.interval()),
            (Quantity::Unit(mine), Quantity::Unit(theirs)) => {
                let ratio = theirs.unit.conversion_factor(&mine.unit)?;
                Ok(other.interval().scaled(ratio))
            }
            (mine, theirs) => Err(FactorError::IncompatibleComparison(format!(
                "cannot compare a {} with a {}",
                mine.kind(),
                theirs.kind()
            ))),
        }
    }

    /// Every value in `self` also lies in `other`.
    pub fn implies(&self, other: &QuantityRange) -> bool {
        match self.converted_interval(other) {
            Ok(theirs) => self.interval().is_subset(&theirs),
            Err(_) => false,
        }
    }

    /// No value lies in both ranges.
    pub fn contradicts(&self, other: &QuantityRange) -> bool {
        match self.converted_interval(other) {
            Ok(theirs) => self.interval().intersect(&theirs).is_empty(),
            Err(_) => false,
        }
    }

    /// Both ranges cover exactly the same values.
    pub fn means(&self, other: &QuantityRange) -> bool {
        match self.converted_interval(other) {
            Ok(theirs) => {
                let mine = self.interval();
                mine.is_subset(&theirs) && theirs.is_subset(&mine)
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for QuantityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sign.phrase(), self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sign: &str, expression: &str) -> QuantityRange {
        QuantityRange::read(sign, expression).unwrap()
    }

    // --- Sign ---

    #[test]
    fn test_sign_aliases() {
        assert_eq!("=".parse::<Sign>().unwrap(), Sign::Eq);
        assert_eq!("<>".parse::<Sign>().unwrap(), Sign::Ne);
        assert!("=>".parse::<Sign>().is_err());
    }

    #[test]
    fn test_sign_opposites_are_involutions() {
        for sign in [Sign::Eq, Sign::Ne, Sign::Gt, Sign::Ge, Sign::Lt, Sign::Le] {
            assert_eq!(sign.opposite().opposite(), sign);
        }
        assert_eq!(Sign::Ne.opposite(), Sign::Eq);
    }

    // --- Reading ---

    #[test]
    fn test_read_kinds() {
        assert_eq!(Quantity::read("3").unwrap(), Quantity::Int(3));
        assert_eq!(Quantity::read("2.5").unwrap(), Quantity::Float(2.5));
        assert_eq!(Quantity::read("-5").unwrap(), Quantity::Int(-5));
        assert_eq!(
            Quantity::read("1990-01-01").unwrap(),
            Quantity::Date(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
        );
        assert!(matches!(Quantity::read("2000 days").unwrap(), Quantity::Unit(_)));
    }

    #[test]
    fn test_read_unknown_unit() {
        let err = Quantity::read("12 parsecs of awesome").unwrap_err();
        assert!(matches!(err, FactorError::UnitConversion(_)));
    }

    #[test]
    fn test_date_magnitude() {
        let q = Quantity::read("2020-12-12").unwrap();
        assert_eq!(q.magnitude(), 20201212.0);
    }

    #[test]
    fn test_unit_range_magnitude() {
        assert_eq!(range("<", "2000 days").magnitude(), 2000.0);
    }

    // --- Rendering ---

    #[test]
    fn test_display() {
        assert_eq!(range(">=", "10 grams").to_string(), "at least 10 gram");
        assert_eq!(range("=", "3").to_string(), "exactly equal to 3");
        assert_eq!(range("<", "1990-01-01").to_string(), "less than 1990-01-01");
    }

    #[test]
    fn test_negated_display() {
        assert_eq!(range(">", "100 meters").negated().to_string(), "no more than 100 meter");
    }

    // --- Intervals ---

    #[test]
    fn test_interval_shapes() {
        assert_eq!(range(">=", "10").interval().to_string(), "[10, inf)");
        assert_eq!(range("<", "10").interval().to_string(), "[0, 10)");
        assert_eq!(range("<", "-1").interval().to_string(), "(-inf, -1)");
        assert_eq!(range("==", "4").interval().to_string(), "{4}");
        assert_eq!(range("!=", "4").interval().to_string(), "[0, 4) ∪ (4, inf)");
    }

    #[test]
    fn test_include_negatives_override() {
        let r = range("<", "10").with_include_negatives(true);
        assert!(r.interval().contains(-3.0));
        assert!(!range("<", "10").interval().contains(-3.0));
    }

    // --- Relations ---

    #[test]
    fn test_unit_implication() {
        assert!(range(">", "20 meters").implies(&range(">", "10 meters")));
        assert!(range(">=", "100 kilograms").implies(&range(">=", "1 gram")));
        assert!(!range(">=", "1 gram").implies(&range(">=", "100 kilograms")));
    }

    #[test]
    fn test_unit_chain() {
        let yards = range(">", "100 yards");
        let meters = range(">", "50 meters");
        let feet = range(">", "30 feet");
        assert!(yards.implies(&meters));
        assert!(meters.implies(&feet));
        assert!(yards.implies(&feet));
        assert!(!feet.implies(&yards));
    }

    #[test]
    fn test_unit_contradiction() {
        let heavy = range(">", "26000 pounds");
        let light = range("<=", "3000 kilograms");
        assert!(heavy.contradicts(&light));
        assert!(light.contradicts(&heavy));
    }

    #[test]
    fn test_converted_means() {
        assert!(range("=", "10 liters").means(&range("=", "10000 milliliters")));
        assert!(!range("=", "10 liters").means(&range("=", "10 milliliters")));
    }

    #[test]
    fn test_negation_equivalent_ranges() {
        let negated = range(">=", "1 ounce").negated();
        assert!(negated.means(&range("<", "1 ounce")));
    }

    #[test]
    fn test_not_equal_relations() {
        assert!(range("==", "3").implies(&range("!=", "4")));
        assert!(!range("!=", "4").implies(&range("==", "3")));
        assert!(range("==", "4").contradicts(&range("!=", "4")));
        assert!(range(">", "5").implies(&range("!=", "5")));
    }

    #[test]
    fn test_point_boundaries() {
        assert!(range("<", "10").contradicts(&range(">=", "10")));
        assert!(!range("<=", "10").contradicts(&range(">=", "10")));
    }

    #[test]
    fn test_int_and_float_compare() {
        assert!(range(">", "2.5").implies(&range(">", "2")));
        assert!(range("<", "2").contradicts(&range(">", "2.5")));
    }

    #[test]
    fn test_date_contradiction() {
        assert!(range("<", "2000-01-01").contradicts(&range(">", "2020-12-12")));
        assert!(range(">", "2020-12-12").implies(&range(">", "2000-01-01")));
    }

    // --- Incompatible kinds ---

    #[test]
    fn test_no_relation_between_kinds() {
        let days = range("<", "2000 days");
        let number = range(">", "2000");
        assert_eq!(days.magnitude(), number.magnitude());
        assert!(!days.contradicts(&number));
        assert!(!days.implies(&number));
        assert!(!days.means(&number));
        assert!(matches!(
            days.converted_interval(&number),
            Err(FactorError::IncompatibleComparison(_))
        ));
    }

    #[test]
    fn test_no_relation_across_dimensions() {
        let length = range(">", "20 meters");
        let mass = range(">", "20 grams");
        assert!(!length.implies(&mass));
        assert!(!length.contradicts(&mass));
        assert!(matches!(
            length.converted_interval(&mass),
            Err(FactorError::UnitConversion(_))
        ));
    }
}
