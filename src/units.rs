//! Unit registry: YAML-driven, loaded once per process.
//!
//! Tries disk first (`data/units.yaml`), falls back to the embedded copy
//! compiled into the binary. Every quantity range resolves its units
//! through the one registry returned by [`registry`]; nothing constructs a
//! second registry at runtime, so two ranges can always be converted into
//! each other's units when their dimensions agree.
//!
//! **To add a new unit: edit `data/units.yaml`. No Rust changes needed.**

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// Embedded fallback
// ---------------------------------------------------------------------------

const UNITS_YAML: &str = include_str!("../data/units.yaml");

// ---------------------------------------------------------------------------
// YAML schema (serde)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UnitsYaml {
    #[serde(default)]
    prefixes: Vec<PrefixRaw>,
    units: Vec<UnitRaw>,
}

#[derive(Debug, Clone, Deserialize)]
struct PrefixRaw {
    name: String,
    symbol: String,
    factor: f64,
}

#[derive(Debug, Deserialize)]
struct UnitRaw {
    name: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    plural: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    dimension: Dimension,
    factor: f64,
    #[serde(default)]
    prefixable: bool,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Exponents of base dimensions, e.g. `{length: 1, time: -1}` for a speed.
/// Zero exponents are never stored.
pub type Dimension = BTreeMap<String, i32>;

/// A resolved unit expression such as `kilogram` or `mile / hour`.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    name: String,
    factor: f64,
    dimension: Dimension,
}

impl Unit {
    /// Canonical display name (`"pound"`, `"mile / hour"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    /// Multiplier into the base unit of the dimension.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn same_dimension(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Multiplier that turns a magnitude in `self` into a magnitude in `target`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64> {
        if !self.same_dimension(target) {
            return Err(FactorError::UnitConversion(format!(
                "cannot convert {} to {}: dimensions differ",
                self.name, target.name
            )));
        }
        Ok(self.factor / target.factor)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A magnitude expressed in a unit, e.g. `26000 pound`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitQuantity {
    pub magnitude: f64,
    pub unit: Unit,
}

impl UnitQuantity {
    /// This quantity's magnitude expressed in `target` units.
    pub fn magnitude_in(&self, target: &Unit) -> Result<f64> {
        Ok(self.magnitude * self.unit.conversion_factor(target)?)
    }
}

impl fmt::Display for UnitQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

#[derive(Debug, Clone)]
struct UnitDef {
    name: String,
    factor: f64,
    dimension: Dimension,
    prefixable: bool,
}

/// The loaded unit table.
pub struct UnitRegistry {
    units: Vec<UnitDef>,
    /// Case-sensitive: symbols, names, plurals and aliases as written.
    exact: HashMap<String, usize>,
    /// Lowercased names, plurals and aliases (never symbols).
    folded: HashMap<String, usize>,
    /// Symbols and aliases usable after a prefix symbol ("k" + "m").
    symbols: HashMap<String, usize>,
    /// Prefixes sorted longest-name first, for "kilometers".
    prefixes_by_name: Vec<PrefixRaw>,
    /// Prefixes sorted longest-symbol first, for "km".
    prefixes_by_symbol: Vec<PrefixRaw>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Build a registry from a YAML string.
pub fn load_units_str(yaml: &str) -> Result<UnitRegistry> {
    let raw: UnitsYaml = serde_yaml::from_str(yaml)?;

    let mut units = Vec::with_capacity(raw.units.len());
    let mut exact = HashMap::new();
    let mut folded = HashMap::new();
    let mut symbols = HashMap::new();

    for entry in raw.units {
        if !(entry.factor > 0.0) {
            return Err(FactorError::UnitConversion(format!(
                "unit '{}' has non-positive factor {}",
                entry.name, entry.factor
            )));
        }
        let index = units.len();
        let plural = entry.plural.clone().unwrap_or_else(|| format!("{}s", entry.name));

        for word in [&entry.name, &plural].into_iter().chain(entry.aliases.iter()) {
            exact.insert(word.clone(), index);
            folded.insert(word.to_lowercase(), index);
        }
        if let Some(symbol) = &entry.symbol {
            exact.insert(symbol.clone(), index);
            symbols.insert(symbol.clone(), index);
        }
        for alias in &entry.aliases {
            symbols.entry(alias.clone()).or_insert(index);
        }

        let mut dimension = entry.dimension;
        dimension.retain(|_, exponent| *exponent != 0);
        units.push(UnitDef {
            name: entry.name,
            factor: entry.factor,
            dimension,
            prefixable: entry.prefixable,
        });
    }

    let mut prefixes_by_name = raw.prefixes.clone();
    prefixes_by_name.sort_by(|a, b| b.name.len().cmp(&a.name.len()));
    let mut prefixes_by_symbol = raw.prefixes;
    prefixes_by_symbol.sort_by(|a, b| b.symbol.len().cmp(&a.symbol.len()));

    Ok(UnitRegistry {
        units,
        exact,
        folded,
        symbols,
        prefixes_by_name,
        prefixes_by_symbol,
    })
}

/// Load from disk, falling back to embedded YAML.
pub fn load_units() -> UnitRegistry {
    if let Ok(yaml) = std::fs::read_to_string("data/units.yaml") {
        match load_units_str(&yaml) {
            Ok(registry) => return registry,
            Err(e) => tracing::warn!(
                error = %e,
                "failed to parse data/units.yaml from disk, using embedded"
            ),
        }
    }
    load_units_str(UNITS_YAML).expect("embedded units.yaml should always parse")
}

// ---------------------------------------------------------------------------
// Query API
// ---------------------------------------------------------------------------

impl UnitRegistry {
    /// Number of base units defined (prefixed forms not counted).
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Parse a quantity string such as `"26000 pounds"`, `"2 km"` or
    /// `"30 miles per hour"`.
    pub fn parse_quantity(&self, text: &str) -> Result<UnitQuantity> {
        let text = text.trim();
        let (number, rest) = split_magnitude(text);
        let magnitude: f64 = number.parse().map_err(|_| {
            FactorError::UnitConversion(format!("no magnitude in quantity '{}'", text))
        })?;
        let unit = self.parse_unit(rest)?;
        Ok(UnitQuantity { magnitude, unit })
    }

    /// Parse a unit expression. Terms are joined by `*`, `/` or `per`, and
    /// may carry an integer power (`m^2`, `m**2`). A `/` or `per` applies to
    /// the single term that follows it.
    pub fn parse_unit(&self, text: &str) -> Result<Unit> {
        let spaced = text
            .replace("**", "^")
            .replace(" ^", "^")
            .replace("^ ", "^")
            .replace('/', " / ")
            .replace('*', " * ");

        let mut numerator: Vec<String> = Vec::new();
        let mut denominator: Vec<String> = Vec::new();
        let mut factor = 1.0;
        let mut dimension = Dimension::new();
        let mut dividing = false;

        for token in spaced.split_whitespace() {
            match token {
                "/" | "per" => {
                    dividing = true;
                    continue;
                }
                "*" => continue,
                _ => {}
            }
            let (word, power) = split_power(token)?;
            let def = self.lookup_word(word).ok_or_else(|| {
                FactorError::UnitConversion(format!("unknown unit '{}'", word))
            })?;
            let exponent = if dividing { -power } else { power };
            dividing = false;

            factor *= def.factor.powi(exponent);
            for (base, exp) in &def.dimension {
                *dimension.entry(base.clone()).or_insert(0) += exp * exponent;
            }
            let label = if power == 1 {
                def.name
            } else {
                format!("{} ** {}", def.name, power)
            };
            if exponent < 0 {
                denominator.push(label);
            } else {
                numerator.push(label);
            }
        }

        if numerator.is_empty() && denominator.is_empty() {
            return Err(FactorError::UnitConversion(format!(
                "no unit in expression '{}'",
                text
            )));
        }
        dimension.retain(|_, exponent| *exponent != 0);

        let mut name = if numerator.is_empty() {
            "1".to_string()
        } else {
            numerator.join(" * ")
        };
        for term in denominator {
            name.push_str(" / ");
            name.push_str(&term);
        }

        Ok(Unit { name, factor, dimension })
    }

    fn lookup_word(&self, word: &str) -> Option<UnitDef> {
        let found = self
            .exact
            .get(word)
            .or_else(|| self.folded.get(&word.to_lowercase()));
        if let Some(&index) = found {
            return Some(self.units[index].clone());
        }

        let lower = word.to_lowercase();
        for prefix in &self.prefixes_by_name {
            if let Some(rest) = lower.strip_prefix(prefix.name.as_str()) {
                if let Some(&index) = self.folded.get(rest) {
                    if let Some(def) = self.prefixed(index, prefix) {
                        return Some(def);
                    }
                }
            }
        }
        for prefix in &self.prefixes_by_symbol {
            if let Some(rest) = word.strip_prefix(prefix.symbol.as_str()) {
                if let Some(&index) = self.symbols.get(rest) {
                    if let Some(def) = self.prefixed(index, prefix) {
                        return Some(def);
                    }
                }
            }
        }
        None
    }

    fn prefixed(&self, index: usize, prefix: &PrefixRaw) -> Option<UnitDef> {
        let base = &self.units[index];
        if !base.prefixable {
            return None;
        }
        Some(UnitDef {
            name: format!("{}{}", prefix.name, base.name),
            factor: prefix.factor * base.factor,
            dimension: base.dimension.clone(),
            prefixable: false,
        })
    }
}

fn split_magnitude(text: &str) -> (&str, &str) {
    if let Some(space) = text.find(char::is_whitespace) {
        if text[..space].parse::<f64>().is_ok() {
            return (&text[..space], text[space..].trim());
        }
    }
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(text.len());
    (&text[..end], text[end..].trim())
}

fn split_power(token: &str) -> Result<(&str, i32)> {
    match token.split_once('^') {
        None => Ok((token, 1)),
        Some((word, power)) => {
            let power: i32 = power.parse().map_err(|_| {
                FactorError::UnitConversion(format!("bad unit power in '{}'", token))
            })?;
            Ok((word, power))
        }
    }
}

// ---------------------------------------------------------------------------
// Global singleton (thread-safe lazy init)
// ---------------------------------------------------------------------------

static REGISTRY: OnceLock<UnitRegistry> = OnceLock::new();

/// Get the process-wide unit registry (loaded once, never mutated).
pub fn registry() -> &'static UnitRegistry {
    REGISTRY.get_or_init(load_units)
}

/// Convert `value` from one unit expression to another.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    let registry = registry();
    let from = registry.parse_unit(from)?;
    let to = registry.parse_unit(to)?;
    Ok(value * from.conversion_factor(&to)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
