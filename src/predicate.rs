use std::collections::BTreeSet;
use std::fmt;

use crate::factor::Factor;
use crate::quantity::{Quantity, QuantityRange};
use crate::template::StatementTemplate;
use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// A phrase with term slots and a truth value. When it carries a
/// [`QuantityRange`] it is a comparison: its template ends in "was" and the
/// range completes the sentence ("... was at least 10 gram").
///
/// `truth` is `Some(true)` by default; `None` reads as "whether".
/// Comparisons never hold `Some(false)`: asking for it flips the sign.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    template: StatementTemplate,
    truth: Option<bool>,
    quantity_range: Option<QuantityRange>,
}

impl Predicate {
    pub fn new(content: &str) -> Self {
        Predicate {
            template: StatementTemplate::new(content),
            truth: Some(true),
            quantity_range: None,
        }
    }

    /// A comparison of the quantity described by `content` against a constant.
    pub fn comparison(content: &str, sign: &str, quantity: impl Into<Quantity>) -> Result<Self> {
        Self::with_range(content, QuantityRange::new(quantity.into(), sign.parse()?))
    }

    /// A comparison built from an already-constructed range.
    pub fn with_range(content: &str, range: QuantityRange) -> Result<Self> {
        let template = StatementTemplate::new(content);
        if !template.content().trim_end().ends_with("was") {
            return Err(FactorError::Construction(format!(
                "a comparison's template must end with the word 'was': '{}'",
                template.content()
            )));
        }
        Ok(Predicate {
            template,
            truth: Some(true),
            quantity_range: Some(range),
        })
    }

    /// Set the truth value. A comparison given `Some(false)` keeps
    /// `Some(true)` and takes the opposite sign instead.
    pub fn with_truth(mut self, truth: impl Into<Option<bool>>) -> Self {
        let truth = truth.into();
        match (&self.quantity_range, truth) {
            (Some(range), Some(false)) => {
                self.quantity_range = Some(range.negated());
                self.truth = Some(true);
            }
            _ => self.truth = truth,
        }
        self
    }

    // --- Accessors ---

    pub fn truth(&self) -> Option<bool> {
        self.truth
    }

    pub fn quantity_range(&self) -> Option<&QuantityRange> {
        self.quantity_range.as_ref()
    }

    pub fn is_comparison(&self) -> bool {
        self.quantity_range.is_some()
    }

    pub fn template(&self) -> &StatementTemplate {
        &self.template
    }

    /// Template text with no terms substituted.
    pub fn content(&self) -> String {
        self.template.content()
    }

    pub fn placeholders(&self) -> &[String] {
        self.template.placeholders()
    }

    /// Number of distinct term slots.
    pub fn arity(&self) -> usize {
        self.template.placeholders().len()
    }

    pub fn content_without_placeholders(&self) -> String {
        self.template.content_without_placeholders()
    }

    /// The template with each term's key in its slot, without the truth prefix.
    pub fn content_with_terms(&self, terms: &[Factor]) -> Result<String> {
        let rendered: Vec<(String, bool)> =
            terms.iter().map(|t| (t.key(), t.is_plural())).collect();
        self.template.render(&rendered)
    }

    /// Prefix `content` with "that", "it was false that" or "whether", and
    /// append the range for a comparison.
    pub fn add_truth_to_content(&self, content: &str) -> String {
        let prefix = match self.truth {
            None => "whether ",
            Some(false) => "it was false that ",
            Some(true) => "that ",
        };
        match &self.quantity_range {
            Some(range) => format!("{}{} {}", prefix, content, range),
            None => format!("{}{}", prefix, content),
        }
    }

    /// Copy with the opposite truth value.
    pub fn negated(&self) -> Predicate {
        match self.truth {
            Some(truth) => self.clone().with_truth(!truth),
            None => self.clone(),
        }
    }

    // --- Term positions ---

    /// For each role, the roles it may trade places with without changing
    /// the meaning. Placeholders are interchangeable when they differ only
    /// in a final digit (`$relative1`, `$relative2`).
    pub fn term_positions(&self) -> Vec<BTreeSet<usize>> {
        let names = self.placeholders();
        names
            .iter()
            .map(|name| {
                names
                    .iter()
                    .enumerate()
                    .filter(|(_, other)| *other == name || interchangeable(name, other))
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect()
    }

    /// Every arrangement of role indices that keeps the meaning. The
    /// identity arrangement comes first.
    pub fn term_index_permutations(&self) -> Vec<Vec<usize>> {
        let positions = self.term_positions();
        let mut product: Vec<Vec<usize>> = vec![Vec::new()];
        for choices in &positions {
            let mut next = Vec::new();
            for prefix in &product {
                for &choice in choices {
                    if !prefix.contains(&choice) {
                        let mut extended = prefix.clone();
                        extended.push(choice);
                        next.push(extended);
                    }
                }
            }
            product = next;
        }

        let identity: Vec<usize> = (0..positions.len()).collect();
        if let Some(index) = product.iter().position(|p| *p == identity) {
            let found = product.remove(index);
            product.insert(0, found);
        }
        product
    }

    // --- Relations ---

    pub fn same_content_meaning(&self, other: &Predicate) -> bool {
        self.content_without_placeholders().to_lowercase()
            == other.content_without_placeholders().to_lowercase()
    }

    pub fn same_term_positions(&self, other: &Predicate) -> bool {
        self.term_positions() == other.term_positions()
    }

    /// Whether `self` and `other` would mean the same thing if both were true.
    pub fn same_meaning_as_true_predicate(&self, other: &Predicate) -> bool {
        self.is_comparison() == other.is_comparison()
            && self.same_content_meaning(other)
            && self.same_term_positions(other)
    }

    /// Same text, same interchangeable roles, same truth and (for
    /// comparisons) the same range of values.
    pub fn means(&self, other: &Predicate) -> bool {
        if !self.same_meaning_as_true_predicate(other) || self.truth != other.truth {
            return false;
        }
        match (&self.quantity_range, &other.quantity_range) {
            (Some(mine), Some(theirs)) => mine.means(theirs),
            _ => true,
        }
    }

    /// `self` settles `other`: same text with equal truth, or `other` only
    /// asks "whether". A comparison must also have a narrower range.
    pub fn implies(&self, other: &Predicate) -> bool {
        if self.truth.is_none() || !self.same_meaning_as_true_predicate(other) {
            return false;
        }
        if other.truth.is_some() && other.truth != self.truth {
            return false;
        }
        match (&self.quantity_range, &other.quantity_range) {
            (Some(mine), Some(theirs)) => mine.implies(theirs),
            _ => true,
        }
    }

    pub fn implies_or_means(&self, other: &Predicate) -> bool {
        self.means(other) || self.implies(other)
    }

    pub fn contradicts(&self, other: &Predicate) -> bool {
        if !self.same_meaning_as_true_predicate(other) {
            return false;
        }
        match (&self.quantity_range, &other.quantity_range) {
            (Some(mine), Some(theirs)) => {
                self.truth == Some(true) && other.truth == Some(true) && mine.contradicts(theirs)
            }
            _ => match (self.truth, other.truth) {
                (Some(mine), Some(theirs)) => mine != theirs,
                _ => false,
            },
        }
    }
}

fn interchangeable(a: &str, b: &str) -> bool {
    let ends_in_digit = |s: &str| s.chars().last().map_or(false, |c| c.is_ascii_digit());
    ends_in_digit(a) && ends_in_digit(b) && a[..a.len() - 1] == b[..b.len() - 1]
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.add_truth_to_content(&self.content()))
    }
}
