use std::iter;

use crate::context::ContextRegister;
use crate::explanation::Explanation;
use crate::factor::Factor;
use crate::group;
use crate::types::Relation;

/// Lazy sequence of complete context registers.
pub type Registers<'a> = Box<dyn Iterator<Item = ContextRegister> + 'a>;

/// Lazy sequence of explanations.
pub type Explanations<'a> = Box<dyn Iterator<Item = Explanation> + 'a>;

// ---------------------------------------------------------------------------
// Search: explicit-stack backtracking
// ---------------------------------------------------------------------------

/// One level of a [`Search`]: every way to extend a partial state.
pub(crate) type Expand<'a, S> = Box<dyn Fn(&S) -> Vec<S> + 'a>;

struct Frame<S> {
    choices: Vec<S>,
    next: usize,
}

/// Depth-first enumeration of the states that survive every level.
///
/// Each frame on the stack holds the candidates one level produced and a
/// cursor into them, so the search can stop after any yielded state and
/// resume where it left off.
pub(crate) struct Search<'a, S> {
    levels: Vec<Expand<'a, S>>,
    stack: Vec<Frame<S>>,
}

impl<'a, S: Clone> Search<'a, S> {
    pub(crate) fn new(seed: S, levels: Vec<Expand<'a, S>>) -> Self {
        Search {
            levels,
            stack: vec![Frame {
                choices: vec![seed],
                next: 0,
            }],
        }
    }
}

impl<'a, S: Clone> Iterator for Search<'a, S> {
    type Item = S;

    fn next(&mut self) -> Option<S> {
        loop {
            let depth = self.stack.len();
            let frame = self.stack.last_mut()?;
            if frame.next >= frame.choices.len() {
                self.stack.pop();
                continue;
            }
            let state = frame.choices[frame.next].clone();
            frame.next += 1;

            if depth - 1 == self.levels.len() {
                return Some(state);
            }
            let choices = (self.levels[depth - 1])(&state);
            self.stack.push(Frame { choices, next: 0 });
        }
    }
}

/// Drop repeats while keeping order.
pub(crate) fn distinct<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut unique = Vec::new();
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

/// Keep only the first explanation for each register.
fn distinct_contexts<'a>(explanations: impl Iterator<Item = Explanation> + 'a) -> Explanations<'a> {
    let mut seen: Vec<ContextRegister> = Vec::new();
    Box::new(explanations.filter(move |explanation| {
        if seen.contains(&explanation.context) {
            false
        } else {
            seen.push(explanation.context.clone());
            true
        }
    }))
}

fn reversed_all<'a>(registers: Registers<'a>) -> Registers<'a> {
    Box::new(registers.map(|register| register.reversed()))
}

fn none<'a, T: 'a>() -> Box<dyn Iterator<Item = T> + 'a> {
    Box::new(iter::empty())
}

fn explained<'a>(
    registers: Registers<'a>,
    left: &'a Factor,
    right: &'a Factor,
    relation: Relation,
) -> Explanations<'a> {
    Box::new(registers.map(move |context| {
        Explanation::new(vec![(left.clone(), right.clone())], context, relation)
    }))
}

// ---------------------------------------------------------------------------
// Term matching
// ---------------------------------------------------------------------------

/// `relation` between a term and the term in the same slot on the other
/// side. An empty right slot is implied by anything and means nothing.
pub(crate) fn holds(relation: Relation, left: &Factor, right: Option<&Factor>) -> bool {
    let Some(right) = right else {
        return matches!(relation, Relation::Implies | Relation::ConsistentWith);
    };
    match relation {
        Relation::Means => left.means(right, None),
        Relation::Implies => left.implies(right, None),
        Relation::Contradicts => left.contradicts(right, None),
        Relation::ConsistentWith => left.consistent_with(right, None),
    }
}

/// Cheap screen before the register search: some ordering of `left`'s terms
/// has `relation` with `right`'s terms slot by slot, ignoring context.
fn terms_compatible(left: &Factor, right: &Factor, relation: Relation) -> bool {
    let theirs = right.terms();
    left.term_permutations().iter().any(|mine| {
        let len = mine.len().max(theirs.len());
        (0..len).all(|i| {
            let left_term = mine.get(i).copied().flatten();
            let right_term = theirs.get(i).copied().flatten();
            match (left_term, right_term) {
                (None, None) => true,
                (None, Some(_)) => false,
                (Some(left_term), right_term) => holds(relation, left_term, right_term),
            }
        })
    })
}

/// `context` plus `left → right`, unless `context` already sends `left`
/// somewhere else or gives `right` another key.
fn generic_register(
    left: &Factor,
    right: &Factor,
    context: &ContextRegister,
) -> Option<ContextRegister> {
    if let Some(bound) = context.get(&left.key()) {
        if bound.key() != right.key() {
            return None;
        }
    }
    let mut incoming = ContextRegister::new();
    incoming.insert_pair(left.clone(), right.clone());
    context.merged_with(&incoming)
}

/// Every register, extending `context`, under which the terms of `left`
/// line up with the terms of `right`.
pub(crate) fn context_registers<'a>(
    left: &'a Factor,
    right: Option<&'a Factor>,
    relation: Relation,
    context: ContextRegister,
) -> Registers<'a> {
    let Some(right) = right else {
        return Box::new(iter::once(context));
    };
    if !left.same_variant(right) {
        return none();
    }
    if left.is_generic() || right.is_generic() {
        return Box::new(generic_register(left, right, &context).into_iter());
    }
    match (left, right) {
        (Factor::Entity(_), Factor::Entity(_)) => {
            if left.key() == right.key() {
                Box::new(iter::once(context))
            } else {
                none()
            }
        }
        (Factor::Group(mine), Factor::Group(theirs)) => {
            group::comparison(mine, relation, theirs.members().iter().collect(), context)
        }
        _ => {
            let right_orders = right.term_permutations();
            let pairs = left.term_permutations().into_iter().flat_map(move |mine| {
                right_orders
                    .clone()
                    .into_iter()
                    .map(move |theirs| (mine.clone(), theirs))
            });
            Box::new(pairs.flat_map(move |(mine, theirs)| {
                ordered_comparison(mine, theirs, relation, context.clone())
            }))
        }
    }
}

/// Match two term sequences slot by slot, threading the register through.
fn ordered_comparison<'a>(
    mine: Vec<Option<&'a Factor>>,
    theirs: Vec<Option<&'a Factor>>,
    relation: Relation,
    context: ContextRegister,
) -> Registers<'a> {
    let len = mine.len().max(theirs.len());
    let levels: Vec<Expand<'a, ContextRegister>> = (0..len)
        .map(|i| {
            let pair = (mine.get(i).copied().flatten(), theirs.get(i).copied().flatten());
            let level: Expand<'a, ContextRegister> =
                Box::new(move |register: &ContextRegister| match pair {
                    (None, None) => vec![register.clone()],
                    (None, Some(_)) => Vec::new(),
                    (Some(_), None) if relation != Relation::Implies => Vec::new(),
                    (Some(left), right) => distinct(update_context_register(
                        left,
                        right,
                        relation,
                        register.clone(),
                    )),
                });
            level
        })
        .collect();
    Box::new(Search::new(context, levels))
}

/// Ways to extend `context` so that `left` has `relation` with `right`,
/// including the variants where `left`'s interchangeable terms swap places.
pub(crate) fn update_context_register<'a>(
    left: &'a Factor,
    right: Option<&'a Factor>,
    relation: Relation,
    context: ContextRegister,
) -> Registers<'a> {
    let base = context.clone();
    let registers = match (left, right) {
        (Factor::Statement(_) | Factor::Assertion(_), Some(right)) => {
            relation_registers(left, right, relation, context)
        }
        _ => context_registers(left, right, relation, context),
    };
    Box::new(
        registers
            .flat_map(move |incoming| interchangeable_variants(left, incoming))
            .filter_map(move |variant| base.merged_with(&variant)),
    )
}

/// Registers for a nested statement or assertion, checked against its
/// predicate and absent flag before its own terms are unified.
fn relation_registers<'a>(
    left: &'a Factor,
    right: &'a Factor,
    relation: Relation,
    context: ContextRegister,
) -> Registers<'a> {
    match relation {
        Relation::Means => same_meaning_registers(left, right, context),
        Relation::Implies => implication_registers(left, right, context),
        Relation::Contradicts => contradiction_registers(left, right, context),
        Relation::ConsistentWith => context_registers(left, Some(right), relation, context),
    }
}

fn interchangeable_variants(factor: &Factor, register: ContextRegister) -> Vec<ContextRegister> {
    let terms: Vec<&Factor> = factor.terms().into_iter().flatten().collect();
    let mut variants = vec![register];
    for ordering in factor.term_permutations().into_iter().skip(1) {
        let swaps = ContextRegister::zipped(terms.iter().copied(), ordering.into_iter().flatten());
        let changed = variants[0].replace_keys(&swaps);
        if !variants.contains(&changed) {
            variants.push(changed);
        }
    }
    variants
}

// ---------------------------------------------------------------------------
// Relations between single factors
// ---------------------------------------------------------------------------

fn means_if_concrete<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    match (left, right) {
        (Factor::Entity(_), Factor::Entity(_)) => {
            context_registers(left, Some(right), Relation::Means, context)
        }
        (Factor::Statement(mine), Factor::Statement(theirs))
            if mine.predicate().means(theirs.predicate())
                && terms_compatible(left, right, Relation::Means) =>
        {
            context_registers(left, Some(right), Relation::Means, context)
        }
        (Factor::Assertion(_), Factor::Assertion(_))
            if terms_compatible(left, right, Relation::Means) =>
        {
            context_registers(left, Some(right), Relation::Means, context)
        }
        _ => none(),
    }
}

fn implies_if_concrete<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    match (left, right) {
        (Factor::Entity(_), Factor::Entity(_)) if !right.is_generic() => {
            context_registers(left, Some(right), Relation::Implies, context)
        }
        (Factor::Statement(mine), Factor::Statement(theirs))
            if mine.predicate().implies_or_means(theirs.predicate())
                && terms_compatible(left, right, Relation::Implies) =>
        {
            context_registers(left, Some(right), Relation::Implies, context)
        }
        (Factor::Assertion(_), Factor::Assertion(_))
            if terms_compatible(left, right, Relation::Implies) =>
        {
            context_registers(left, Some(right), Relation::Implies, context)
        }
        _ => none(),
    }
}

/// Implication as if neither side were absent.
fn implies_if_present<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    if !left.same_variant(right) {
        return none();
    }
    let generic = if right.is_generic() {
        generic_register(left, right, &context)
    } else {
        None
    };
    let concrete = if left.is_generic() {
        none()
    } else {
        implies_if_concrete(left, right, context)
    };
    Box::new(generic.into_iter().chain(concrete))
}

/// Contradiction as if neither side were absent. Only statements can
/// contradict each other directly.
fn contradicts_if_present<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    match (left, right) {
        (Factor::Statement(mine), Factor::Statement(theirs))
            if mine.predicate().contradicts(theirs.predicate()) =>
        {
            context_registers(left, Some(right), Relation::Implies, context)
        }
        _ => none(),
    }
}

fn implication_registers<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    if !left.same_variant(right) {
        return none();
    }
    match (left.is_absent(), right.is_absent()) {
        (false, false) => implies_if_present(left, right, context),
        (false, true) => contradicts_if_present(left, right, context),
        (true, true) => reversed_all(implies_if_present(right, left, context.reversed())),
        (true, false) => reversed_all(contradicts_if_present(right, left, context.reversed())),
    }
}

fn contradiction_registers<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    if !left.same_variant(right) {
        return none();
    }
    match (left.is_absent(), right.is_absent()) {
        (false, false) => contradicts_if_present(left, right, context),
        (false, true) => implies_if_present(left, right, context),
        (true, false) => reversed_all(implies_if_present(right, left, context.reversed())),
        // two absences never clash
        (true, true) => none(),
    }
}

fn same_meaning_registers<'a>(
    left: &'a Factor,
    right: &'a Factor,
    context: ContextRegister,
) -> Registers<'a> {
    if !left.same_variant(right)
        || left.is_generic() != right.is_generic()
        || left.is_absent() != right.is_absent()
    {
        return none();
    }
    if left.is_generic() {
        return Box::new(generic_register(left, right, &context).into_iter());
    }
    means_if_concrete(left, right, context)
}

/// The context that pairs the generic terms of `left` and `right` in order,
/// if `left` and `right` are related that way and it adds something.
fn likely_from(
    left: &Factor,
    right: &Factor,
    context: &ContextRegister,
    relation: Relation,
) -> Option<ContextRegister> {
    let related = match relation {
        Relation::Means => {
            left.means(right, Some(context)) || right.means(left, Some(&context.reversed()))
        }
        _ => left.implies(right, Some(context)) || right.implies(left, Some(&context.reversed())),
    };
    if !related {
        return None;
    }
    let incoming = ContextRegister::zipped(left.generic_terms(), right.generic_terms());
    context
        .merged_with(&incoming)
        .filter(|updated| updated != context)
}

// ---------------------------------------------------------------------------
// Public comparison API
// ---------------------------------------------------------------------------

impl Factor {
    // --- Enumerations ---

    /// Registers under which `self` and `other` say the same thing.
    pub fn explanations_same_meaning<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Explanations<'a> {
        let context = context.cloned().unwrap_or_default();
        match (self, other) {
            (Factor::Group(mine), Factor::Group(theirs)) => {
                distinct_contexts(group::same_meaning(mine, theirs, context))
            }
            _ => distinct_contexts(explained(
                same_meaning_registers(self, other, context),
                self,
                other,
                Relation::Means,
            )),
        }
    }

    /// Registers under which `self` implies `other`.
    pub fn explanations_implication<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Explanations<'a> {
        let context = context.cloned().unwrap_or_default();
        match (self, other) {
            (Factor::Group(mine), _) => distinct_contexts(group::implication(mine, other, context)),
            (_, Factor::Group(theirs)) if theirs.is_empty() => Box::new(iter::once(Explanation::new(
                Vec::new(),
                context,
                Relation::Implies,
            ))),
            (_, Factor::Group(_)) => none(),
            _ => distinct_contexts(explained(
                implication_registers(self, other, context),
                self,
                other,
                Relation::Implies,
            )),
        }
    }

    /// Registers under which `other` implies `self`, keyed from `self`'s side.
    pub fn explanations_implied_by<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Explanations<'a> {
        let reversed = context.map(ContextRegister::reversed);
        Box::new(
            other
                .explanations_implication(self, reversed.as_ref())
                .map(|explanation| explanation.reversed()),
        )
    }

    /// Registers under which `self` and `other` cannot both hold.
    pub fn explanations_contradiction<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Explanations<'a> {
        let context = context.cloned().unwrap_or_default();
        match (self, other) {
            (Factor::Group(mine), _) => {
                distinct_contexts(group::contradiction(mine, other, context))
            }
            (_, Factor::Group(theirs)) => {
                distinct_contexts(theirs.members().iter().flat_map(move |member| {
                    self.explanations_contradiction(member, Some(&context))
                }))
            }
            _ => distinct_contexts(explained(
                contradiction_registers(self, other, context),
                self,
                other,
                Relation::Contradicts,
            )),
        }
    }

    /// Complete contexts under which `self` and `other` do not contradict.
    pub fn explanations_consistent_with<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Explanations<'a> {
        let context = context.cloned().unwrap_or_default();
        if let Factor::Group(mine) = self {
            return group::consistency(mine, other, context);
        }
        Box::new(
            self.possible_contexts(other, Some(&context))
                .filter(move |possible| !self.contradicts(other, Some(possible)))
                .map(move |possible| {
                    Explanation::new(
                        vec![(self.clone(), other.clone())],
                        possible,
                        Relation::ConsistentWith,
                    )
                }),
        )
    }

    // --- Boolean relations ---

    /// Same meaning, checked in both directions.
    pub fn means(&self, other: &Factor, context: Option<&ContextRegister>) -> bool {
        let reversed = context.map(ContextRegister::reversed);
        self.explanations_same_meaning(other, context).next().is_some()
            && other
                .explanations_same_meaning(self, reversed.as_ref())
                .next()
                .is_some()
    }

    pub fn implies(&self, other: &Factor, context: Option<&ContextRegister>) -> bool {
        self.explanations_implication(other, context).next().is_some()
    }

    pub fn implied_by(&self, other: &Factor, context: Option<&ContextRegister>) -> bool {
        self.explanations_implied_by(other, context).next().is_some()
    }

    pub fn contradicts(&self, other: &Factor, context: Option<&ContextRegister>) -> bool {
        self.explanations_contradiction(other, context).next().is_some()
    }

    pub fn consistent_with(&self, other: &Factor, context: Option<&ContextRegister>) -> bool {
        self.explanations_consistent_with(other, context).next().is_some()
    }

    // --- First explanations ---

    pub fn explain_same_meaning(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> Option<Explanation> {
        self.explanations_same_meaning(other, context).next()
    }

    pub fn explain_implication(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> Option<Explanation> {
        self.explanations_implication(other, context).next()
    }

    pub fn explain_implied_by(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> Option<Explanation> {
        self.explanations_implied_by(other, context).next()
    }

    pub fn explain_contradiction(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> Option<Explanation> {
        self.explanations_contradiction(other, context).next()
    }

    pub fn explain_consistent_with(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> Option<Explanation> {
        self.explanations_consistent_with(other, context).next()
    }

    // --- Contexts ---

    /// Every way to pair the generic terms `context` leaves unbound on
    /// each side, merged into `context`.
    pub fn possible_contexts<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Registers<'a> {
        let context = context.cloned().unwrap_or_default();
        let unused_left: Vec<&'a Factor> = self
            .generic_terms()
            .into_iter()
            .filter(|term| !context.contains_key(&term.key()))
            .collect();
        let unused_right: Vec<&'a Factor> = other
            .generic_terms()
            .into_iter()
            .filter(|term| !context.contains_value(&term.key()))
            .collect();
        if unused_left.is_empty() || unused_right.is_empty() {
            return Box::new(iter::once(context));
        }

        let width = unused_right.len();
        let levels: Vec<Expand<'a, Vec<usize>>> = (0..unused_left.len().min(width))
            .map(|_| {
                let level: Expand<'a, Vec<usize>> = Box::new(move |chosen: &Vec<usize>| {
                    (0..width)
                        .filter(|i| !chosen.contains(i))
                        .map(|i| {
                            let mut extended = chosen.clone();
                            extended.push(i);
                            extended
                        })
                        .collect()
                });
                level
            })
            .collect();

        Box::new(Search::new(Vec::new(), levels).filter_map(move |chosen| {
            let incoming = ContextRegister::zipped(
                unused_left.iter().copied(),
                chosen.iter().map(|&i| unused_right[i]),
            );
            context.merged_with(&incoming)
        }))
    }

    /// Contexts suggested by factors that mean or imply each other, most
    /// specific first. The given context always comes last.
    pub fn likely_contexts<'a>(
        &'a self,
        other: &'a Factor,
        context: Option<&ContextRegister>,
    ) -> Registers<'a> {
        let context = context.cloned().unwrap_or_default();
        if let Factor::Group(mine) = self {
            return group::likely_contexts(mine, other, context);
        }
        let same_meaning = likely_from(self, other, &context, Relation::Means);
        let implied = likely_from(
            self,
            other,
            same_meaning.as_ref().unwrap_or(&context),
            Relation::Implies,
        );
        let candidates = implied.into_iter().chain(same_meaning).chain(iter::once(context));
        Box::new(distinct(candidates).into_iter())
    }

    /// Whether `self` implies `other` with every generic term of `self`
    /// standing for itself.
    pub fn implies_same_context(&self, other: &Factor) -> bool {
        let same: ContextRegister = self
            .generic_terms()
            .into_iter()
            .map(|term| (term.clone(), term.clone()))
            .collect();
        self.implies(other, Some(&same))
    }

    /// Whether every way of matching `self` to `other` agrees with `context`
    /// on all of `self`'s generic terms.
    pub fn all_generic_factors_match(
        &self,
        other: &Factor,
        context: Option<&ContextRegister>,
    ) -> bool {
        let context = context.cloned().unwrap_or_default();
        let generics = self.generic_terms();
        context_registers(self, Some(other), Relation::Means, context.clone()).all(|register| {
            generics
                .iter()
                .all(|generic| context.assigns_same_value(&register, generic))
        })
    }
}
