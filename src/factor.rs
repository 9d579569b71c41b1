use std::collections::HashMap;
use std::fmt;

use crate::context::ContextRegister;
use crate::group::FactorGroup;
use crate::predicate::Predicate;
use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A thing a statement can talk about. Generic entities (the default) are
/// stand-ins: any other generic entity can take their place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    name: String,
    generic: bool,
    plural: bool,
}

impl Entity {
    /// A generic entity.
    pub fn new(name: impl Into<String>) -> Self {
        Entity {
            name: name.into(),
            generic: true,
            plural: false,
        }
    }

    /// A specific entity, which only matches an entity with the same name.
    pub fn specific(name: impl Into<String>) -> Self {
        Entity {
            generic: false,
            ..Entity::new(name)
        }
    }

    /// Mark as referring to more than one thing.
    pub fn plural(mut self) -> Self {
        self.plural = true;
        self
    }

    pub fn with_generic(mut self, generic: bool) -> Self {
        self.generic = generic;
        self
    }

    pub fn with_plural(mut self, plural: bool) -> Self {
        self.plural = plural;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }

    pub fn is_plural(&self) -> bool {
        self.plural
    }

    /// `<name>` for a generic entity, `name` for a specific one.
    pub fn key(&self) -> String {
        if self.generic {
            format!("<{}>", self.name)
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

/// A predicate with its term slots filled.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    predicate: Predicate,
    terms: Vec<Factor>,
    absent: bool,
    generic: bool,
    name: Option<String>,
}

impl Statement {
    /// Fill `predicate`'s roles with `terms`, in order of first appearance.
    ///
    /// Fails if the count is wrong, if a term is a group, or if one term
    /// fills two roles that are not interchangeable.
    pub fn new(predicate: Predicate, terms: Vec<Factor>) -> Result<Self> {
        if terms.len() != predicate.arity() {
            return Err(FactorError::Construction(format!(
                "expected {} terms for '{}', got {}",
                predicate.arity(),
                predicate,
                terms.len()
            )));
        }
        if let Some(group) = terms.iter().find(|t| matches!(t, Factor::Group(_))) {
            return Err(FactorError::Construction(format!(
                "a group cannot be the term of a statement: {}",
                group
            )));
        }

        let positions = predicate.term_positions();
        let keys: Vec<String> = terms.iter().map(Factor::key).collect();
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                if keys[i] == keys[j] && !positions[i].contains(&j) {
                    return Err(FactorError::Construction(format!(
                        "{} fills both ${} and ${} in '{}'",
                        keys[i],
                        predicate.placeholders()[i],
                        predicate.placeholders()[j],
                        predicate.content()
                    )));
                }
            }
        }

        Ok(Statement {
            predicate,
            terms,
            absent: false,
            generic: false,
            name: None,
        })
    }

    /// Fill `predicate`'s roles by placeholder name. Every placeholder needs
    /// exactly one term and every name must be a placeholder.
    pub fn from_mapping<S: Into<String>>(
        predicate: Predicate,
        mapping: impl IntoIterator<Item = (S, Factor)>,
    ) -> Result<Self> {
        let mut by_name: HashMap<String, Factor> = HashMap::new();
        for (name, term) in mapping {
            let name = name.into();
            let name = name.strip_prefix('$').unwrap_or(&name).to_string();
            if !predicate.placeholders().contains(&name) {
                return Err(FactorError::Construction(format!(
                    "'{}' has no placeholder ${}",
                    predicate.content(),
                    name
                )));
            }
            by_name.insert(name, term);
        }
        let terms = predicate
            .placeholders()
            .iter()
            .map(|name| {
                by_name.remove(name).ok_or_else(|| {
                    FactorError::Construction(format!(
                        "no term given for ${} in '{}'",
                        name,
                        predicate.content()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Statement::new(predicate, terms)
    }

    pub fn with_absent(mut self, absent: bool) -> Self {
        self.absent = absent;
        self
    }

    pub fn with_generic(mut self, generic: bool) -> Self {
        self.generic = generic;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn terms(&self) -> &[Factor] {
        &self.terms
    }

    pub fn truth(&self) -> Option<bool> {
        self.predicate.truth()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_absent(&self) -> bool {
        self.absent
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = self
            .predicate
            .content_with_terms(&self.terms)
            .map_err(|_| fmt::Error)?;
        let text = format!("the statement {}", self.predicate.add_truth_to_content(&content));
        write!(f, "{}", framed(text, self.generic, self.absent))
    }
}

// ---------------------------------------------------------------------------
// Assertion
// ---------------------------------------------------------------------------

/// A statement attributed to an authority (or to no one in particular).
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    statement: Box<Factor>,
    authority: Option<Box<Factor>>,
    absent: bool,
    generic: bool,
    name: Option<String>,
}

impl Assertion {
    pub fn new(statement: Statement, authority: Option<Entity>) -> Self {
        Assertion {
            statement: Box::new(Factor::Statement(statement)),
            authority: authority.map(|a| Box::new(Factor::Entity(a))),
            absent: false,
            generic: false,
            name: None,
        }
    }

    pub fn with_absent(mut self, absent: bool) -> Self {
        self.absent = absent;
        self
    }

    pub fn with_generic(mut self, generic: bool) -> Self {
        self.generic = generic;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn statement(&self) -> &Factor {
        &self.statement
    }

    pub fn authority(&self) -> Option<&Factor> {
        self.authority.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_absent(&self) -> bool {
        self.absent
    }

    pub fn is_generic(&self) -> bool {
        self.generic
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match &self.authority {
            Some(authority) => format!(
                "the assertion, by {}, of {}",
                authority.key(),
                self.statement.key()
            ),
            None => format!("the assertion of {}", self.statement.key()),
        };
        write!(f, "{}", framed(text, self.generic, self.absent))
    }
}

fn framed(text: String, generic: bool, absent: bool) -> String {
    let text = if generic { format!("<{}>", text) } else { text };
    if absent {
        format!("absence of {}", text)
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// Factor: the closed set of comparable things
// ---------------------------------------------------------------------------

/// Anything that can be compared: an entity, a statement, an assertion or
/// a group of factors.
#[derive(Debug, Clone, PartialEq)]
pub enum Factor {
    Entity(Entity),
    Statement(Statement),
    Assertion(Assertion),
    Group(FactorGroup),
}

impl Factor {
    /// String identity used for every lookup in a [`ContextRegister`].
    pub fn key(&self) -> String {
        match self {
            Factor::Entity(entity) => entity.key(),
            other => other.to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Factor::Entity(entity) => Some(entity.name()),
            Factor::Statement(statement) => statement.name(),
            Factor::Assertion(assertion) => assertion.name(),
            Factor::Group(_) => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        match self {
            Factor::Entity(entity) => entity.is_generic(),
            Factor::Statement(statement) => statement.is_generic(),
            Factor::Assertion(assertion) => assertion.is_generic(),
            Factor::Group(_) => false,
        }
    }

    pub fn is_absent(&self) -> bool {
        match self {
            Factor::Statement(statement) => statement.is_absent(),
            Factor::Assertion(assertion) => assertion.is_absent(),
            _ => false,
        }
    }

    pub fn is_plural(&self) -> bool {
        matches!(self, Factor::Entity(entity) if entity.is_plural())
    }

    /// Whether `self` and `other` are the same kind of factor.
    pub fn same_variant(&self, other: &Factor) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The term slots of this factor. An assertion's slots are its statement
    /// and its authority, which may be empty.
    pub fn terms(&self) -> Vec<Option<&Factor>> {
        match self {
            Factor::Entity(_) => Vec::new(),
            Factor::Statement(statement) => statement.terms().iter().map(Some).collect(),
            Factor::Assertion(assertion) => {
                vec![Some(assertion.statement()), assertion.authority()]
            }
            Factor::Group(group) => group.members().iter().map(Some).collect(),
        }
    }

    /// Orderings of the terms that keep the meaning, identity first. Only a
    /// statement with interchangeable placeholders has more than one.
    pub fn term_permutations(&self) -> Vec<Vec<Option<&Factor>>> {
        match self {
            Factor::Statement(statement) => statement
                .predicate()
                .term_index_permutations()
                .into_iter()
                .map(|pattern| {
                    let mut arranged: Vec<Option<&Factor>> = vec![None; pattern.len()];
                    for (term, &slot) in statement.terms().iter().zip(&pattern) {
                        arranged[slot] = Some(term);
                    }
                    arranged
                })
                .collect(),
            other => vec![other.terms()],
        }
    }

    /// Every generic term in this factor and its descendants, depth first,
    /// once per key. A generic factor is its own only generic term.
    pub fn generic_terms(&self) -> Vec<&Factor> {
        let mut found = Vec::new();
        self.collect_generic_terms(&mut found);
        found
    }

    fn collect_generic_terms<'a>(&'a self, found: &mut Vec<&'a Factor>) {
        if self.is_generic() {
            let key = self.key();
            if !found.iter().any(|f| f.key() == key) {
                found.push(self);
            }
            return;
        }
        for term in self.terms().into_iter().flatten() {
            term.collect_generic_terms(found);
        }
    }

    /// Find this factor or a descendant whose key or name is `query`.
    pub fn get_factor(&self, query: &str) -> Option<&Factor> {
        self.find(&|f: &Factor| f.key() == query)
            .or_else(|| self.find(&|f: &Factor| f.name() == Some(query)))
    }

    fn find(&self, matches: &dyn Fn(&Factor) -> bool) -> Option<&Factor> {
        if matches(self) {
            return Some(self);
        }
        self.terms()
            .into_iter()
            .flatten()
            .find_map(|term| term.find(matches))
    }

    /// Copy with every factor named by a key of `changes` (by key or by
    /// name) replaced by its value.
    pub fn new_context(&self, changes: &ContextRegister) -> Factor {
        let replacement = changes
            .get(&self.key())
            .or_else(|| self.name().and_then(|name| changes.get(name)));
        if let Some(replacement) = replacement {
            return replacement.clone();
        }
        match self {
            Factor::Entity(_) => self.clone(),
            Factor::Statement(statement) => {
                let mut changed = statement.clone();
                changed.terms = statement.terms.iter().map(|t| t.new_context(changes)).collect();
                Factor::Statement(changed)
            }
            Factor::Assertion(assertion) => {
                let mut changed = assertion.clone();
                changed.statement = Box::new(assertion.statement.new_context(changes));
                changed.authority = assertion
                    .authority
                    .as_ref()
                    .map(|a| Box::new(a.new_context(changes)));
                Factor::Assertion(changed)
            }
            Factor::Group(group) => Factor::Group(group.new_context(changes)),
        }
    }

    /// Substitute `values` for [`generic_terms`](Self::generic_terms), in order.
    pub fn new_context_aligned(&self, values: &[Factor]) -> Result<Factor> {
        let keys: Vec<Factor> = self.generic_terms().into_iter().cloned().collect();
        if keys.len() != values.len() {
            return Err(FactorError::ContextFormat(format!(
                "needed {} replacements for the generic terms of {}, got {}",
                keys.len(),
                self,
                values.len()
            )));
        }
        Ok(self.new_context(&ContextRegister::from_lists(&keys, values)?))
    }

    /// Copy marked generic. Groups have no generic form and are returned as-is.
    pub fn make_generic(&self) -> Factor {
        match self {
            Factor::Entity(entity) => Factor::Entity(entity.clone().with_generic(true)),
            Factor::Statement(statement) => Factor::Statement(statement.clone().with_generic(true)),
            Factor::Assertion(assertion) => Factor::Assertion(assertion.clone().with_generic(true)),
            Factor::Group(_) => self.clone(),
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Entity(entity) => write!(f, "{}", entity),
            Factor::Statement(statement) => write!(f, "{}", statement),
            Factor::Assertion(assertion) => write!(f, "{}", assertion),
            Factor::Group(group) => write!(f, "{}", group),
        }
    }
}

impl From<Entity> for Factor {
    fn from(entity: Entity) -> Self {
        Factor::Entity(entity)
    }
}

impl From<Statement> for Factor {
    fn from(statement: Statement) -> Self {
        Factor::Statement(statement)
    }
}

impl From<Assertion> for Factor {
    fn from(assertion: Assertion) -> Self {
        Factor::Assertion(assertion)
    }
}

impl From<FactorGroup> for Factor {
    fn from(group: FactorGroup) -> Self {
        Factor::Group(group)
    }
}

impl From<&Factor> for Factor {
    fn from(factor: &Factor) -> Self {
        factor.clone()
    }
}
