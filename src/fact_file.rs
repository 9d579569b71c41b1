use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::factor::{Assertion, Entity, Factor, Statement};
use crate::group::FactorGroup;
use crate::predicate::Predicate;
use crate::quantity::{Quantity, QuantityRange};
use crate::types::{FactorError, Result};

// ---------------------------------------------------------------------------
// YAML-deserialisable factor structures
// ---------------------------------------------------------------------------

fn default_truth() -> Option<bool> {
    Some(true)
}

fn default_generic_entity() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_true(value: &bool) -> bool {
    *value
}

/// The constant a comparison is made against. Text is read with
/// [`Quantity::read`], so it may be a date or carry units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawExpression {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPredicate {
    pub content: String,
    /// Missing means true; an explicit `null` means "whether".
    #[serde(default = "default_truth")]
    pub truth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<RawExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_negatives: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawFactor {
    Entity {
        name: String,
        #[serde(default = "default_generic_entity", skip_serializing_if = "is_true")]
        generic: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        plural: bool,
    },
    Statement {
        predicate: RawPredicate,
        #[serde(default)]
        terms: Vec<RawFactor>,
        #[serde(default, skip_serializing_if = "is_false")]
        absent: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        generic: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assertion {
        statement: Box<RawFactor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authority: Option<Box<RawFactor>>,
        #[serde(default, skip_serializing_if = "is_false")]
        absent: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        generic: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Group {
        #[serde(default)]
        members: Vec<RawFactor>,
    },
}

/// A YAML document of named factors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactFile {
    #[serde(default)]
    pub factors: BTreeMap<String, RawFactor>,
}

// ---------------------------------------------------------------------------
// Raw structures <-> factors
// ---------------------------------------------------------------------------

impl RawPredicate {
    pub fn build(&self) -> Result<Predicate> {
        let predicate = match (&self.sign, &self.expression) {
            (None, None) => Predicate::new(&self.content),
            (Some(sign), Some(expression)) => {
                let quantity = match expression {
                    RawExpression::Int(n) => Quantity::Int(*n),
                    RawExpression::Float(x) => Quantity::Float(*x),
                    RawExpression::Text(text) => Quantity::read(text)?,
                };
                let mut range = QuantityRange::new(quantity, sign.parse()?);
                if let Some(include_negatives) = self.include_negatives {
                    range = range.with_include_negatives(include_negatives);
                }
                Predicate::with_range(&self.content, range)?
            }
            _ => {
                return Err(FactorError::FactFile(format!(
                    "predicate '{}' needs both a sign and an expression to be a comparison",
                    self.content
                )))
            }
        };
        Ok(predicate.with_truth(self.truth))
    }

    pub fn from_predicate(predicate: &Predicate) -> Self {
        let range = predicate.quantity_range();
        RawPredicate {
            content: predicate.content(),
            truth: predicate.truth(),
            sign: range.map(|r| r.sign().symbol().to_string()),
            expression: range.map(|r| match r.quantity() {
                Quantity::Int(n) => RawExpression::Int(*n),
                Quantity::Float(x) => RawExpression::Float(*x),
                other => RawExpression::Text(other.to_string()),
            }),
            // Only recorded when it differs from what the quantity implies.
            include_negatives: range
                .filter(|r| r.include_negatives() != (r.magnitude() < 0.0))
                .map(|r| r.include_negatives()),
        }
    }
}

impl RawFactor {
    pub fn build(&self) -> Result<Factor> {
        match self {
            RawFactor::Entity { name, generic, plural } => Ok(Entity::new(name.as_str())
                .with_generic(*generic)
                .with_plural(*plural)
                .into()),
            RawFactor::Statement { .. } => self.build_statement().map(Factor::Statement),
            RawFactor::Assertion {
                statement,
                authority,
                absent,
                generic,
                name,
            } => {
                let statement = statement.build_statement()?;
                let authority = match authority {
                    None => None,
                    Some(raw) => match raw.build()? {
                        Factor::Entity(entity) => Some(entity),
                        other => {
                            return Err(FactorError::FactFile(format!(
                                "the authority of an assertion must be an entity, not {}",
                                other
                            )))
                        }
                    },
                };
                let mut assertion = Assertion::new(statement, authority)
                    .with_absent(*absent)
                    .with_generic(*generic);
                if let Some(name) = name {
                    assertion = assertion.with_name(name.as_str());
                }
                Ok(assertion.into())
            }
            RawFactor::Group { members } => {
                let members = members.iter().map(RawFactor::build).collect::<Result<Vec<_>>>()?;
                Ok(FactorGroup::new(members)?.into())
            }
        }
    }

    fn build_statement(&self) -> Result<Statement> {
        match self {
            RawFactor::Statement {
                predicate,
                terms,
                absent,
                generic,
                name,
            } => {
                let terms = terms.iter().map(RawFactor::build).collect::<Result<Vec<_>>>()?;
                let mut statement = Statement::new(predicate.build()?, terms)?
                    .with_absent(*absent)
                    .with_generic(*generic);
                if let Some(name) = name {
                    statement = statement.with_name(name.as_str());
                }
                Ok(statement)
            }
            _ => Err(FactorError::FactFile(
                "an assertion must wrap a statement".to_string(),
            )),
        }
    }

    pub fn from_factor(factor: &Factor) -> Self {
        match factor {
            Factor::Entity(entity) => RawFactor::Entity {
                name: entity.name().to_string(),
                generic: entity.is_generic(),
                plural: entity.is_plural(),
            },
            Factor::Statement(statement) => RawFactor::Statement {
                predicate: RawPredicate::from_predicate(statement.predicate()),
                terms: statement.terms().iter().map(RawFactor::from_factor).collect(),
                absent: statement.is_absent(),
                generic: statement.is_generic(),
                name: statement.name().map(str::to_string),
            },
            Factor::Assertion(assertion) => RawFactor::Assertion {
                statement: Box::new(RawFactor::from_factor(assertion.statement())),
                authority: assertion
                    .authority()
                    .map(|authority| Box::new(RawFactor::from_factor(authority))),
                absent: assertion.is_absent(),
                generic: assertion.is_generic(),
                name: assertion.name().map(str::to_string),
            },
            Factor::Group(group) => RawFactor::Group {
                members: group.iter().map(RawFactor::from_factor).collect(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// The factors of a fact file, built and looked up by their document keys.
#[derive(Debug, Clone, Default)]
pub struct FactIndex {
    factors: BTreeMap<String, Factor>,
}

impl FactIndex {
    pub fn build(file: FactFile) -> Result<Self> {
        let mut factors = BTreeMap::new();
        for (key, raw) in &file.factors {
            let factor = raw
                .build()
                .map_err(|e| FactorError::FactFile(format!("factor '{}': {}", key, e)))?;
            factors.insert(key.clone(), factor);
        }
        Ok(FactIndex { factors })
    }

    pub fn get(&self, key: &str) -> Option<&Factor> {
        self.factors.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Factor)> {
        self.factors.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Back to the document form, for [`dump_fact_file`].
    pub fn to_fact_file(&self) -> FactFile {
        FactFile {
            factors: self
                .factors
                .iter()
                .map(|(k, v)| (k.clone(), RawFactor::from_factor(v)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub fn load_fact_file(path: &Path) -> Result<FactIndex> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        FactorError::FactFile(format!("cannot read {}: {}", path.display(), e))
    })?;
    let file: FactFile = serde_yaml::from_str(&content).map_err(|e| {
        FactorError::FactFile(format!("parse error in {}: {}", path.display(), e))
    })?;
    FactIndex::build(file)
}

/// Load a fact file from a YAML string.
pub fn load_fact_file_str(yaml: &str) -> Result<FactIndex> {
    let file: FactFile = serde_yaml::from_str(yaml)
        .map_err(|e| FactorError::FactFile(format!("parse error: {}", e)))?;
    FactIndex::build(file)
}

/// Load several fact files into one index. On a key conflict the first
/// file to define the key wins.
pub fn load_fact_files(paths: &[impl AsRef<Path>]) -> Result<FactIndex> {
    let mut merged = FactFile::default();
    for path in paths {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            FactorError::FactFile(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        let file: FactFile = serde_yaml::from_str(&content).map_err(|e| {
            FactorError::FactFile(format!("parse error in {}: {}", path.as_ref().display(), e))
        })?;
        for (key, raw) in file.factors {
            if merged.factors.contains_key(&key) {
                tracing::debug!(
                    key = %key,
                    path = %path.as_ref().display(),
                    "fact already loaded, skipping"
                );
                continue;
            }
            merged.factors.insert(key, raw);
        }
    }
    FactIndex::build(merged)
}

/// A single factor from a YAML document in the `RawFactor` form.
pub fn load_factor_str(yaml: &str) -> Result<Factor> {
    let raw: RawFactor = serde_yaml::from_str(yaml)?;
    raw.build()
}

pub fn dump_factor(factor: &Factor) -> Result<String> {
    Ok(serde_yaml::to_string(&RawFactor::from_factor(factor))?)
}

pub fn dump_fact_file(index: &FactIndex) -> Result<String> {
    Ok(serde_yaml::to_string(&index.to_fact_file())?)
}

/// Write `index` to `path` as a fact file.
pub fn write_fact_file(path: &Path, index: &FactIndex) -> Result<()> {
    std::fs::write(path, dump_fact_file(index)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_load_treaties() {
        let path = PathBuf::from("data/treaties.yaml");
        let index = load_fact_file(&path).expect("should load fact file");
        assert_eq!(index.len(), 2);
        let nafta = index.get("nafta").unwrap();
        let brexit = index.get("brexit").unwrap();
        match (nafta, brexit) {
            (Factor::Group(a), Factor::Group(b)) => {
                assert_eq!(a.len(), 3);
                assert_eq!(b.len(), 3);
            }
            _ => panic!("expected two groups"),
        }
        assert!(nafta.contradicts(brexit, None));
    }

    #[test]
    fn test_malformed_yaml() {
        let dir = PathBuf::from("tmp");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("bad_facts.yaml");
        std::fs::write(&path, "{{{{not yaml").unwrap();
        let result = load_fact_file(&path);
        assert!(result.is_err());
        let err_msg = format!("{}", result.unwrap_err());
        assert!(err_msg.contains("parse error"), "got: {}", err_msg);
    }

    #[test]
    fn test_missing_file() {
        let path = PathBuf::from("data/nonexistent.yaml");
        let err_msg = format!("{}", load_fact_file(&path).unwrap_err());
        assert!(err_msg.contains("cannot read"), "got: {}", err_msg);
    }

    // --- Field defaults ---

    #[test]
    fn test_truth_defaults_to_true() {
        let raw: RawPredicate = serde_yaml::from_str("content: $person was a pilot").unwrap();
        assert_eq!(raw.truth, Some(true));
    }

    #[test]
    fn test_explicit_null_truth_means_whether() {
        let raw: RawPredicate =
            serde_yaml::from_str("content: $person was a pilot\ntruth: null").unwrap();
        assert_eq!(raw.truth, None);
        assert_eq!(raw.build().unwrap().truth(), None);
    }

    #[test]
    fn test_entity_defaults_to_generic() {
        let factor = load_factor_str("type: entity\nname: Alice").unwrap();
        assert!(factor.is_generic());
        let factor = load_factor_str("type: entity\nname: Alice\ngeneric: false").unwrap();
        assert!(!factor.is_generic());
    }

    // --- Comparisons ---

    #[test]
    fn test_comparison_with_units() {
        let yaml = r#"
type: statement
predicate:
  content: the distance between $place1 and $place2 was
  sign: "<"
  expression: 35 foot
terms:
  - type: entity
    name: the stockpile
  - type: entity
    name: the school
"#;
        let factor = load_factor_str(yaml).unwrap();
        let Factor::Statement(statement) = &factor else {
            panic!("expected a statement");
        };
        assert!(statement.predicate().is_comparison());
        assert_eq!(
            statement.predicate().quantity_range().unwrap().to_string(),
            "less than 35 foot"
        );
    }

    #[test]
    fn test_false_comparison_is_flipped() {
        let yaml =
            "content: the weight of $thing was\nsign: \">=\"\nexpression: 1 ounce\ntruth: false";
        let predicate: Predicate =
            serde_yaml::from_str::<RawPredicate>(yaml).unwrap().build().unwrap();
        assert_eq!(predicate.truth(), Some(true));
        assert_eq!(predicate.quantity_range().unwrap().sign().symbol(), "<");
    }

    #[test]
    fn test_sign_without_expression_rejected() {
        let raw = RawPredicate {
            content: "the weight of $thing was".to_string(),
            truth: Some(true),
            sign: Some(">".to_string()),
            expression: None,
            include_negatives: None,
        };
        assert!(matches!(raw.build(), Err(FactorError::FactFile(_))));
    }

    // --- Structural errors ---

    #[test]
    fn test_wrong_term_count_reports_key() {
        let yaml = r#"
factors:
  lonely:
    type: statement
    predicate:
      content: $a met $b
    terms:
      - type: entity
        name: Alice
"#;
        let err_msg = format!("{}", load_fact_file_str(yaml).unwrap_err());
        assert!(err_msg.contains("lonely"), "got: {}", err_msg);
    }

    #[test]
    fn test_assertion_authority_must_be_entity() {
        let yaml = r#"
type: assertion
statement:
  type: statement
  predicate:
    content: the sky was blue
authority:
  type: statement
  predicate:
    content: the grass was green
"#;
        assert!(matches!(load_factor_str(yaml), Err(FactorError::FactFile(_))));
    }

    #[test]
    fn test_assertion_must_wrap_statement() {
        let yaml = "type: assertion\nstatement:\n  type: entity\n  name: Alice";
        assert!(load_factor_str(yaml).is_err());
    }

    // --- Dumping ---

    #[test]
    fn test_dump_omits_defaults() {
        let factor: Factor = Statement::new(
            Predicate::new("$person was a pilot"),
            vec![Entity::new("Amelia").into()],
        )
        .unwrap()
        .into();
        let yaml = dump_factor(&factor).unwrap();
        assert!(yaml.contains("type: statement"));
        assert!(!yaml.contains("absent"));
        assert!(!yaml.contains("generic"));
        assert_eq!(load_factor_str(&yaml).unwrap(), factor);
    }

    #[test]
    fn test_dump_keeps_whether() {
        let factor: Factor = Statement::new(
            Predicate::new("$person was a pilot").with_truth(None),
            vec![Entity::new("Amelia").into()],
        )
        .unwrap()
        .into();
        let reloaded = load_factor_str(&dump_factor(&factor).unwrap()).unwrap();
        assert_eq!(reloaded, factor);
    }

    #[test]
    fn test_dump_fact_file_reloads() {
        let index = load_fact_file(&PathBuf::from("data/treaties.yaml")).unwrap();
        let reloaded = load_fact_file_str(&dump_fact_file(&index).unwrap()).unwrap();
        assert_eq!(reloaded.get("nafta"), index.get("nafta"));
        assert_eq!(reloaded.get("brexit"), index.get("brexit"));
    }

    #[test]
    fn test_write_fact_file_reloads() {
        let dir = PathBuf::from("tmp");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("written_treaties.yaml");
        let index = load_fact_file(&PathBuf::from("data/treaties.yaml")).unwrap();
        write_fact_file(&path, &index).unwrap();
        let reloaded = load_fact_file(&path).unwrap();
        assert_eq!(reloaded.get("brexit"), index.get("brexit"));
    }

    #[test]
    fn test_write_fact_file_io_error() {
        let path = PathBuf::from("tmp/no/such/dir/facts.yaml");
        let err = write_fact_file(&path, &FactIndex::default()).unwrap_err();
        assert!(matches!(err, FactorError::Io(_)), "got: {}", err);
    }

    #[test]
    fn test_load_fact_files_first_wins() {
        let dir = PathBuf::from("tmp");
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("override_facts.yaml");
        std::fs::write(
            &path,
            "factors:\n  nafta:\n    type: entity\n    name: Mexico\n  \
             extra:\n    type: entity\n    name: Chile\n",
        )
        .unwrap();
        let index = load_fact_files(&[PathBuf::from("data/treaties.yaml"), path]).unwrap();
        assert_eq!(index.len(), 3);
        assert!(matches!(index.get("nafta"), Some(Factor::Group(_))));
        assert_eq!(index.get("extra").unwrap().key(), "<Chile>");
    }
}
