pub mod types;
pub mod units;
pub mod quantity;
pub mod template;
pub mod predicate;
pub mod context;
pub mod factor;
pub mod group;
pub mod matching;
pub mod explanation;
pub mod fact_file;

pub use context::{ContextRegister, ContextSeed};
pub use explanation::Explanation;
pub use factor::{Assertion, Entity, Factor, Statement};
pub use group::FactorGroup;
pub use predicate::Predicate;
pub use quantity::{Quantity, QuantityRange, Sign};
pub use types::{FactorError, Relation, Result};
