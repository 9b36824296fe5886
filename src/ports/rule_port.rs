//! Rule storage port trait.

use crate::domain::error::WardenError;
use crate::domain::rule::Rule;

pub trait RulePort {
    fn load_rules(&self) -> Result<Vec<Rule>, WardenError>;
}
