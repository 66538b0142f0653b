//! Domain types shared between the database layer and the resolver.

pub mod build;
pub mod package;
