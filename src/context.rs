use std::collections::HashMap;
use std::fmt;

use crate::factor::Factor;
use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// ContextRegister: bijective mapping between the terms of two factors
// ---------------------------------------------------------------------------

/// A mapping from terms on the left side of a comparison to terms on the
/// right side. Lookups go through [`Factor::key`], in both directions.
///
/// Entries keep their insertion order for rendering; equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct ContextRegister {
    entries: Vec<(Factor, Factor)>,
    forward: HashMap<String, usize>,
    reverse: HashMap<String, usize>,
}

impl ContextRegister {
    /// Create an empty register.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `keys[i]` with `values[i]`.
    pub fn from_lists(keys: &[Factor], values: &[Factor]) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(FactorError::ContextFormat(format!(
                "cannot pair {} keys with {} values",
                keys.len(),
                values.len()
            )));
        }
        let mut register = ContextRegister::new();
        for (key, value) in keys.iter().zip(values) {
            for side in [key, value] {
                if matches!(side, Factor::Group(_)) {
                    return Err(FactorError::ContextFormat(format!(
                        "a group cannot be a context term: {}",
                        side
                    )));
                }
            }
            register.insert_pair(key.clone(), value.clone());
        }
        Ok(register)
    }

    /// A register of the pairs that `zip` produces; extra items on the
    /// longer side are ignored.
    pub(crate) fn zipped<'a>(
        keys: impl IntoIterator<Item = &'a Factor>,
        values: impl IntoIterator<Item = &'a Factor>,
    ) -> Self {
        let mut register = ContextRegister::new();
        for (key, value) in keys.into_iter().zip(values) {
            register.insert_pair(key.clone(), value.clone());
        }
        register
    }

    /// Map `key` to `value`, dropping any earlier entry for the same key or
    /// the same value.
    pub fn insert_pair(&mut self, key: impl Into<Factor>, value: impl Into<Factor>) {
        let (key, value) = (key.into(), value.into());
        let (key_str, value_str) = (key.key(), value.key());
        let before = self.entries.len();
        self.entries
            .retain(|(k, v)| k.key() != key_str && v.key() != value_str);
        if self.entries.len() != before {
            self.reindex();
        }
        self.forward.insert(key_str, self.entries.len());
        self.reverse.insert(value_str, self.entries.len());
        self.entries.push((key, value));
    }

    fn reindex(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        for (i, (key, value)) in self.entries.iter().enumerate() {
            self.forward.insert(key.key(), i);
            self.reverse.insert(value.key(), i);
        }
    }

    // --- Lookup ---

    /// The value bound to the key string `key`.
    pub fn get(&self, key: &str) -> Option<&Factor> {
        self.forward.get(key).map(|&i| &self.entries[i].1)
    }

    /// The key bound to the value string `value`.
    pub fn get_reverse(&self, value: &str) -> Option<&Factor> {
        self.reverse.get(value).map(|&i| &self.entries[i].0)
    }

    /// The value bound to `key`.
    pub fn get_factor(&self, key: &Factor) -> Option<&Factor> {
        self.get(&key.key())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.forward.contains_key(key)
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.reverse.contains_key(value)
    }

    /// Whether `key` is bound to a value with the same key as `value`.
    pub fn check_match(&self, key: &Factor, value: &Factor) -> bool {
        self.get_factor(key).map_or(false, |bound| bound.key() == value.key())
    }

    /// Whether `self` and `other` bind `key` to the same value. False when
    /// `self` leaves it unbound.
    pub fn assigns_same_value(&self, other: &ContextRegister, key: &Factor) -> bool {
        match (self.get_factor(key), other.get_factor(key)) {
            (Some(mine), Some(theirs)) => mine.key() == theirs.key(),
            _ => false,
        }
    }

    pub fn factor_pairs(&self) -> impl Iterator<Item = (&Factor, &Factor)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Factor> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Factor> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // --- Derived registers ---

    /// Swap keys and values.
    pub fn reversed(&self) -> ContextRegister {
        let mut result = ContextRegister::new();
        for (key, value) in &self.entries {
            result.insert_pair(value.clone(), key.clone());
        }
        result
    }

    /// Rename keys through `replacements`. Keys it does not mention are kept.
    pub fn replace_keys(&self, replacements: &ContextRegister) -> ContextRegister {
        let mut result = ContextRegister::new();
        for (key, value) in &self.entries {
            let key = replacements.get(&key.key()).unwrap_or(key);
            result.insert_pair(key.clone(), value.clone());
        }
        result
    }

    /// Add every pair of `incoming` to a copy of `self`. `None` if a key
    /// would get a second value or a value a second key.
    pub fn merged_with(&self, incoming: &ContextRegister) -> Option<ContextRegister> {
        let mut merged = self.clone();
        for (key, value) in &incoming.entries {
            let (key_str, value_str) = (key.key(), value.key());
            if let Some(existing) = merged.get(&key_str) {
                if existing.key() != value_str {
                    tracing::debug!(
                        key = %key_str,
                        existing = %existing,
                        incoming = %value_str,
                        "key already bound to another value"
                    );
                    return None;
                }
            }
            if let Some(owner) = merged.get_reverse(&value_str) {
                if owner.key() != key_str {
                    tracing::debug!(value = %value_str, "value assigned to two different keys");
                    return None;
                }
            }
            merged.insert_pair(key.clone(), value.clone());
        }
        Some(merged)
    }

    // --- Rendering ---

    /// English summary of the pairs: "<Alice> is like <Craig>, and <Bob> is
    /// like <Dan>".
    pub fn reason(&self) -> String {
        let mut similes: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| {
                let verb = if key.is_plural() { "are" } else { "is" };
                format!("{} {} like {}", key.key(), verb, value.key())
            })
            .collect();
        if similes.len() > 1 {
            let last = similes.split_off(similes.len() - 2).join(", and ");
            similes.push(last);
        }
        similes.join(", ")
    }
}

impl PartialEq for ContextRegister {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.check_match(key, value))
    }
}

impl FromIterator<(Factor, Factor)> for ContextRegister {
    fn from_iter<I: IntoIterator<Item = (Factor, Factor)>>(iter: I) -> Self {
        let mut register = ContextRegister::new();
        for (key, value) in iter {
            register.insert_pair(key, value);
        }
        register
    }
}

impl fmt::Display for ContextRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} → {}", key.key(), value.key())?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// ContextSeed: caller-supplied partial context
// ---------------------------------------------------------------------------

/// The forms a caller may use to pin down part of the context before a
/// comparison. [`ContextSeed::resolve`] turns any of them into a register
/// from the left factor's terms to the right factor's terms.
#[derive(Debug, Clone)]
pub enum ContextSeed {
    Register(ContextRegister),
    /// Two aligned lists of terms.
    Lists { keys: Vec<Factor>, values: Vec<Factor> },
    /// Pairs of term keys or names, looked up on each side.
    Names(Vec<(String, String)>),
    /// Right-side terms aligned with the left factor's generic terms.
    Aligned(Vec<Factor>),
}

impl ContextSeed {
    /// Every key must be a generic term of `left` and every value a generic
    /// term of `right`.
    pub fn resolve(&self, left: &Factor, right: &Factor) -> Result<ContextRegister> {
        let register = match self {
            ContextSeed::Register(register) => register.clone(),
            ContextSeed::Lists { keys, values } => ContextRegister::from_lists(keys, values)?,
            ContextSeed::Names(pairs) => {
                let mut register = ContextRegister::new();
                for (left_name, right_name) in pairs {
                    register.insert_pair(
                        named_term(left, left_name)?.clone(),
                        named_term(right, right_name)?.clone(),
                    );
                }
                register
            }
            ContextSeed::Aligned(values) => {
                let keys: Vec<Factor> = left.generic_terms().into_iter().cloned().collect();
                if keys.len() != values.len() {
                    return Err(FactorError::ContextFormat(format!(
                        "{} has {} generic terms but {} replacements were given",
                        left,
                        keys.len(),
                        values.len()
                    )));
                }
                ContextRegister::from_lists(&keys, values)?
            }
        };
        check_side(register.keys(), left)?;
        check_side(register.values(), right)?;
        Ok(register)
    }
}

fn named_term<'a>(factor: &'a Factor, name: &str) -> Result<&'a Factor> {
    factor
        .get_factor(name)
        .ok_or_else(|| FactorError::ContextFormat(format!("no term '{}' in {}", name, factor)))
}

fn check_side<'a>(terms: impl Iterator<Item = &'a Factor>, factor: &Factor) -> Result<()> {
    let known: Vec<String> = factor.generic_terms().into_iter().map(Factor::key).collect();
    for term in terms {
        if !known.contains(&term.key()) {
            return Err(FactorError::ContextFormat(format!(
                "{} is not a generic term of {}",
                term.key(),
                factor
            )));
        }
    }
    Ok(())
}

impl From<ContextRegister> for ContextSeed {
    fn from(register: ContextRegister) -> Self {
        ContextSeed::Register(register)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor::{Entity, Statement};
    use crate::predicate::Predicate;

    fn e(name: &str) -> Factor {
        Entity::new(name).into()
    }

    // --- Insertion ---

    #[test]
    fn test_insert_and_lookup() {
        let mut register = ContextRegister::new();
        register.insert_pair(e("Alice"), e("Craig"));
        assert_eq!(register.get("<Alice>").map(|f| f.key()), Some("<Craig>".to_string()));
        assert_eq!(register.get_reverse("<Craig>").map(|f| f.key()), Some("<Alice>".to_string()));
        assert!(register.check_match(&e("Alice"), &e("Craig")));
        assert!(!register.check_match(&e("Alice"), &e("Dan")));
    }

    #[test]
    fn test_insert_replaces_stale_entries() {
        let mut register = ContextRegister::new();
        register.insert_pair(e("Alice"), e("Craig"));
        register.insert_pair(e("Bob"), e("Craig"));
        assert_eq!(register.len(), 1);
        assert!(register.get("<Alice>").is_none());
        assert!(register.check_match(&e("Bob"), &e("Craig")));
    }

    #[test]
    fn test_from_lists_length_mismatch() {
        let err = ContextRegister::from_lists(&[e("Alice")], &[]).unwrap_err();
        assert!(matches!(err, FactorError::ContextFormat(_)));
    }

    // --- Equality ---

    #[test]
    fn test_equality_ignores_order() {
        let a: ContextRegister = vec![(e("A"), e("X")), (e("B"), e("Y"))].into_iter().collect();
        let b: ContextRegister = vec![(e("B"), e("Y")), (e("A"), e("X"))].into_iter().collect();
        let c: ContextRegister = vec![(e("A"), e("Y")), (e("B"), e("X"))].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    // --- Merging ---

    #[test]
    fn test_merge_compatible() {
        let left: ContextRegister = vec![(e("A"), e("X"))].into_iter().collect();
        let right: ContextRegister = vec![(e("B"), e("Y")), (e("A"), e("X"))].into_iter().collect();
        let merged = left.merged_with(&right).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_conflicting_key() {
        let left: ContextRegister = vec![(e("A"), e("X"))].into_iter().collect();
        let right: ContextRegister = vec![(e("A"), e("Y"))].into_iter().collect();
        assert!(left.merged_with(&right).is_none());
    }

    #[test]
    fn test_merge_value_assigned_twice() {
        let left: ContextRegister = vec![(e("A"), e("X"))].into_iter().collect();
        let right: ContextRegister = vec![(e("B"), e("X"))].into_iter().collect();
        assert!(left.merged_with(&right).is_none());
    }

    // --- Derived registers ---

    #[test]
    fn test_reversed() {
        let register: ContextRegister = vec![(e("A"), e("X"))].into_iter().collect();
        let reversed = register.reversed();
        assert!(reversed.check_match(&e("X"), &e("A")));
        assert_eq!(reversed.reversed(), register);
    }

    #[test]
    fn test_replace_keys_keeps_unmentioned() {
        let register: ContextRegister =
            vec![(e("A"), e("X")), (e("C"), e("Z"))].into_iter().collect();
        let swaps: ContextRegister = vec![(e("A"), e("B"))].into_iter().collect();
        let replaced = register.replace_keys(&swaps);
        assert!(replaced.check_match(&e("B"), &e("X")));
        assert!(replaced.check_match(&e("C"), &e("Z")));
    }

    // --- Rendering ---

    #[test]
    fn test_reason() {
        let one: ContextRegister = vec![(e("Alice"), e("Craig"))].into_iter().collect();
        assert_eq!(one.reason(), "<Alice> is like <Craig>");

        let three: ContextRegister = vec![
            (e("A"), e("X")),
            (Entity::new("the Bs").plural().into(), e("Y")),
            (e("C"), e("Z")),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            three.reason(),
            "<A> is like <X>, <the Bs> are like <Y>, and <C> is like <Z>"
        );
    }

    #[test]
    fn test_display() {
        let register: ContextRegister = vec![(e("Alice"), e("Craig"))].into_iter().collect();
        assert_eq!(register.to_string(), "{<Alice> → <Craig>}");
    }

    // --- Seeds ---

    fn shot(shooter: &str, victim: &str) -> Factor {
        Statement::new(Predicate::new("$shooter shot $victim"), vec![e(shooter), e(victim)])
            .unwrap()
            .into()
    }

    #[test]
    fn test_seed_names() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed = ContextSeed::Names(vec![("Alice".into(), "<Craig>".into())]);
        let register = seed.resolve(&left, &right).unwrap();
        assert!(register.check_match(&e("Alice"), &e("Craig")));
    }

    #[test]
    fn test_seed_unknown_name() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed = ContextSeed::Names(vec![("Zed".into(), "Craig".into())]);
        assert!(matches!(seed.resolve(&left, &right), Err(FactorError::ContextFormat(_))));
    }

    #[test]
    fn test_seed_aligned() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed = ContextSeed::Aligned(vec![e("Dan"), e("Craig")]);
        let register = seed.resolve(&left, &right).unwrap();
        assert!(register.check_match(&e("Alice"), &e("Dan")));
        assert!(register.check_match(&e("Bob"), &e("Craig")));

        let short = ContextSeed::Aligned(vec![e("Dan")]);
        assert!(short.resolve(&left, &right).is_err());
    }

    #[test]
    fn test_seed_lists_unknown_key() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed = ContextSeed::Lists {
            keys: vec![e("Zed")],
            values: vec![e("Craig")],
        };
        assert!(matches!(seed.resolve(&left, &right), Err(FactorError::ContextFormat(_))));
    }

    #[test]
    fn test_seed_register_unknown_value() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed: ContextSeed = vec![(e("Alice"), e("Erin"))]
            .into_iter()
            .collect::<ContextRegister>()
            .into();
        assert!(matches!(seed.resolve(&left, &right), Err(FactorError::ContextFormat(_))));
    }

    #[test]
    fn test_seed_aligned_unknown_value() {
        let left = shot("Alice", "Bob");
        let right = shot("Craig", "Dan");
        let seed = ContextSeed::Aligned(vec![e("Xu"), e("Yi")]);
        assert!(matches!(seed.resolve(&left, &right), Err(FactorError::ContextFormat(_))));
    }
}
