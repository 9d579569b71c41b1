use std::fmt;

use crate::context::ContextRegister;
use crate::factor::Factor;
use crate::types::Relation;

/// Why one factor (or set of factors) stands in a relation to another: the
/// pairs that were matched, and the register under which they match.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub factor_matches: Vec<(Factor, Factor)>,
    pub context: ContextRegister,
    pub relation: Relation,
}

impl Explanation {
    pub fn new(
        factor_matches: Vec<(Factor, Factor)>,
        context: ContextRegister,
        relation: Relation,
    ) -> Self {
        Explanation {
            factor_matches,
            context,
            relation,
        }
    }

    /// Copy with one more matched pair.
    pub fn with_match(&self, left: Factor, right: Factor) -> Explanation {
        let mut factor_matches = self.factor_matches.clone();
        factor_matches.push((left, right));
        Explanation {
            factor_matches,
            ..self.clone()
        }
    }

    /// Swap the sides of every pair and of the register.
    pub fn reversed(&self) -> Explanation {
        Explanation {
            factor_matches: self
                .factor_matches
                .iter()
                .map(|(left, right)| (right.clone(), left.clone()))
                .collect(),
            context: self.context.reversed(),
            relation: self.relation,
        }
    }

    /// "X is like Y" clauses, ordered by where each key first appears among
    /// the generic terms of the left factors.
    pub fn reason(&self) -> String {
        let mut ordered = ContextRegister::new();
        for (left, _) in &self.factor_matches {
            for term in left.generic_terms() {
                if let Some(value) = self.context.get_factor(term) {
                    if !ordered.contains_key(&term.key()) {
                        ordered.insert_pair(term.clone(), value.clone());
                    }
                }
            }
        }
        for (key, value) in self.context.factor_pairs() {
            if !ordered.contains_key(&key.key()) {
                ordered.insert_pair(key.clone(), value.clone());
            }
        }
        ordered.reason()
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EXPLANATION:")?;
        if !self.context.is_empty() {
            write!(f, " Because {},", self.reason())?;
        }
        for (left, right) in &self.factor_matches {
            write!(f, "\n{}\n{}\n{}", indented(left), self.relation, indented(right))?;
        }
        Ok(())
    }
}

fn indented(factor: &Factor) -> String {
    factor
        .to_string()
        .lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
