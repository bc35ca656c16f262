//! Error types for the name registry

use somnia_types::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameRegistryError {
    #[error("Invalid name: {name}")]
    InvalidName { name: String },

    #[error("Name already exists: {name}")]
    NameAlreadyExists { name: String },

    #[error("Name not found: {name}")]
    NameNotFound { name: String },

    #[error("{caller} is not the owner of {name}")]
    NotOwner { name: String, caller: Address },
}

pub type Result<T> = std::result::Result<T, NameRegistryError>;
