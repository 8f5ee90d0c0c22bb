//! Errors surfaced to the analysis driver.
//!
//! Expressions a domain cannot interpret are never errors: the domain degrades to a
//! coarser value instead. Only violated preconditions end up here.

use thiserror::Error;

use crate::expr::{Identifier, Type};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    /// The domain was handed an identifier whose type it cannot track.
    #[error("domain `{domain}` cannot track identifier `{id}` of type {ty:?}")]
    UntrackableIdentifier {
        domain: &'static str,
        id: Identifier,
        ty: Type,
    },
}

impl SemanticError {
    pub fn untrackable(domain: &'static str, id: &Identifier) -> Self {
        SemanticError::UntrackableIdentifier {
            domain,
            id: id.clone(),
            ty: id.ty(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SemanticError>;
