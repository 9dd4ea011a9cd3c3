// padsync-common: changeset pipeline and shared types for the padsync workspace

pub mod attributes;
pub mod changeset;
pub mod identity;
pub mod path;
pub mod protocol;
pub mod types;
