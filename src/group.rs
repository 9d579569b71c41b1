use std::fmt;
use std::iter;
use std::ops::BitOr;

use crate::context::ContextRegister;
use crate::explanation::Explanation;
use crate::factor::{Factor, Statement};
use crate::matching::{
    distinct, holds, update_context_register, Expand, Explanations, Registers, Search,
};
use crate::types::{FactorError, Relation, Result};

// ---------------------------------------------------------------------------
// FactorGroup
// ---------------------------------------------------------------------------

/// Factors compared together: a match against a group needs one register
/// that works for every member at once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorGroup {
    members: Vec<Factor>,
}

impl FactorGroup {
    /// Group `members`, dropping exact duplicates. Entities are terms, not
    /// factors, and cannot be members.
    pub fn new(members: Vec<Factor>) -> Result<Self> {
        if let Some(entity) = members.iter().find(|m| matches!(m, Factor::Entity(_))) {
            return Err(FactorError::Construction(format!(
                "an entity cannot be a member of a group: {}",
                entity
            )));
        }
        Ok(FactorGroup {
            members: distinct(members),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_statements(statements: Vec<Statement>) -> Self {
        FactorGroup {
            members: distinct(statements.into_iter().map(Factor::Statement)),
        }
    }

    pub fn members(&self) -> &[Factor] {
        &self.members
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Factor> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members of `self` followed by the members of `other`.
    pub fn add(&self, other: &FactorGroup) -> FactorGroup {
        FactorGroup {
            members: distinct(self.members.iter().chain(&other.members).cloned()),
        }
    }

    /// Generic terms of all members, first appearance wins.
    pub fn generic_terms(&self) -> Vec<&Factor> {
        let mut found: Vec<&Factor> = Vec::new();
        for term in self.members.iter().flat_map(Factor::generic_terms) {
            if !found.iter().any(|f| f.key() == term.key()) {
                found.push(term);
            }
        }
        found
    }

    pub fn new_context(&self, changes: &ContextRegister) -> FactorGroup {
        FactorGroup {
            members: self.members.iter().map(|m| m.new_context(changes)).collect(),
        }
    }

    /// Copy without the members that another member already implies.
    pub fn drop_implied_factors(&self) -> FactorGroup {
        let mut kept: Vec<Factor> = Vec::new();
        for candidate in &self.members {
            if kept.iter().any(|k| k.implies_same_context(candidate)) {
                continue;
            }
            kept.retain(|k| !candidate.implies_same_context(k));
            kept.push(candidate.clone());
        }
        FactorGroup { members: kept }
    }

    /// Whether no two members contradict each other. Without a context each
    /// generic term stands for itself.
    pub fn internally_consistent(&self, context: Option<&ContextRegister>) -> bool {
        let context = match context {
            Some(context) => context.clone(),
            None => self
                .generic_terms()
                .into_iter()
                .map(|term| (term.clone(), term.clone()))
                .collect(),
        };
        for (i, current) in self.members.iter().enumerate() {
            for other in &self.members[i + 1..] {
                if !current.consistent_with(other, Some(&context)) {
                    return false;
                }
            }
        }
        true
    }

    /// One group holding everything `self` and `other` say, with `other`'s
    /// generic terms renamed to match `self`'s where they seem to line up.
    /// `None` if every such combination contradicts itself.
    pub fn union(&self, other: &Factor, context: Option<&ContextRegister>) -> Option<FactorGroup> {
        let other = match other {
            Factor::Group(group) => group.clone(),
            single => FactorGroup::new(vec![single.clone()]).ok()?,
        };
        let left = Factor::Group(self.clone());
        let right = Factor::Group(other.clone());

        for likely in left.likely_contexts(&right, context) {
            let partial = self.add(&other.new_context(&likely.reversed()));
            if !partial.internally_consistent(None) {
                continue;
            }
            for guess in left.possible_contexts(&right, Some(&likely)) {
                let combined = self
                    .add(&other.new_context(&guess.reversed()))
                    .drop_implied_factors();
                if combined.internally_consistent(None) {
                    return Some(combined);
                }
            }
        }
        tracing::debug!(left = %self, right = %other, "no consistent union");
        None
    }
}

impl fmt::Display for FactorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.members.iter().map(Factor::key).collect();
        write!(f, "FactorGroup({:?})", keys)
    }
}

impl<'a> IntoIterator for &'a FactorGroup {
    type Item = &'a Factor;
    type IntoIter = std::slice::Iter<'a, Factor>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

impl BitOr<&Factor> for &FactorGroup {
    type Output = Option<FactorGroup>;

    fn bitor(self, rhs: &Factor) -> Option<FactorGroup> {
        self.union(rhs, None)
    }
}

impl BitOr<&FactorGroup> for &FactorGroup {
    type Output = Option<FactorGroup>;

    fn bitor(self, rhs: &FactorGroup) -> Option<FactorGroup> {
        self.union(&Factor::Group(rhs.clone()), None)
    }
}

// ---------------------------------------------------------------------------
// Group matching
// ---------------------------------------------------------------------------

/// The members of `other` if it is a group, otherwise `other` itself.
fn as_members(other: &Factor) -> Vec<&Factor> {
    match other {
        Factor::Group(group) => group.members().iter().collect(),
        single => vec![single],
    }
}

/// Match every factor in `needs` to some member of `group` under one
/// register. Members may be used more than once or not at all.
fn verbose_comparison<'a>(
    group: &'a FactorGroup,
    relation: Relation,
    needs: Vec<&'a Factor>,
    seed: Explanation,
) -> Explanations<'a> {
    let levels: Vec<Expand<'a, Explanation>> = needs
        .into_iter()
        .rev()
        .map(|needed| {
            let candidates: Vec<&'a Factor> = group
                .members()
                .iter()
                .filter(|member| holds(relation, member, Some(needed)))
                .collect();
            let level: Expand<'a, Explanation> = Box::new(move |explanation: &Explanation| {
                let mut extended = Vec::new();
                for &candidate in &candidates {
                    let matched = explanation.with_match(candidate.clone(), needed.clone());
                    for register in update_context_register(
                        candidate,
                        Some(needed),
                        relation,
                        explanation.context.clone(),
                    ) {
                        let next = Explanation {
                            context: register,
                            ..matched.clone()
                        };
                        if !extended.contains(&next) {
                            extended.push(next);
                        }
                    }
                }
                extended
            });
            level
        })
        .collect();
    Box::new(Search::new(seed, levels))
}

/// Registers under which each of `needs` has `relation` with some member.
pub(crate) fn comparison<'a>(
    group: &'a FactorGroup,
    relation: Relation,
    needs: Vec<&'a Factor>,
    context: ContextRegister,
) -> Registers<'a> {
    let seed = Explanation::new(Vec::new(), context, relation);
    Box::new(
        verbose_comparison(group, relation, needs, seed).map(|explanation| explanation.context),
    )
}

pub(crate) fn implication<'a>(
    group: &'a FactorGroup,
    other: &'a Factor,
    context: ContextRegister,
) -> Explanations<'a> {
    let seed = Explanation::new(Vec::new(), context, Relation::Implies);
    if group.is_empty() {
        return Box::new(iter::once(seed));
    }
    verbose_comparison(group, Relation::Implies, as_members(other), seed)
}

/// Every member of `group` has a match in `other`, then every member of
/// `other` has a match in `group`.
pub(crate) fn same_meaning<'a>(
    group: &'a FactorGroup,
    other: &'a FactorGroup,
    context: ContextRegister,
) -> Explanations<'a> {
    let members = group.members().iter().collect();
    let shares_all = comparison(other, Relation::Means, members, context.reversed())
        .map(|register| register.reversed());
    Box::new(shares_all.flat_map(move |register| {
        let seed = Explanation::new(Vec::new(), register, Relation::Means);
        verbose_comparison(group, Relation::Means, other.members().iter().collect(), seed)
    }))
}

pub(crate) fn contradiction<'a>(
    group: &'a FactorGroup,
    other: &'a Factor,
    context: ContextRegister,
) -> Explanations<'a> {
    Box::new(as_members(other).into_iter().flat_map(move |theirs| {
        let context = context.clone();
        group
            .members()
            .iter()
            .flat_map(move |mine| mine.explanations_contradiction(theirs, Some(&context)))
    }))
}

/// A member that contradicts `other` with all of its generic terms already
/// pinned by `context` rules out consistency.
fn must_contradict(group: &FactorGroup, other: &Factor, context: &ContextRegister) -> bool {
    as_members(other).into_iter().any(|theirs| {
        group.members().iter().any(|mine| {
            mine.contradicts(theirs, Some(context))
                && mine.all_generic_factors_match(theirs, Some(context))
        })
    })
}

pub(crate) fn consistency<'a>(
    group: &'a FactorGroup,
    other: &'a Factor,
    context: ContextRegister,
) -> Explanations<'a> {
    if must_contradict(group, other, &context) {
        return Box::new(iter::empty());
    }
    Box::new(iter::once(Explanation::new(Vec::new(), context, Relation::ConsistentWith)))
}

/// Thread each (member, other factor) pair's likely contexts through one
/// search, so later pairs build on what earlier pairs suggested.
pub(crate) fn likely_contexts<'a>(
    group: &'a FactorGroup,
    other: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    let mut levels: Vec<Expand<'a, ContextRegister>> = Vec::new();
    for theirs in as_members(other) {
        for mine in group.members() {
            levels.push(Box::new(move |register: &ContextRegister| {
                mine.likely_contexts(theirs, Some(register)).collect()
            }));
        }
    }
    let mut seen: Vec<ContextRegister> = Vec::new();
    Box::new(Search::new(context, levels).filter(move |register| {
        if seen.contains(register) {
            false
        } else {
            seen.push(register.clone());
            true
        }
    }))
}
