//! Database models for the Vigil backend.
//!
//! ## Row Projections
//! Queries load rows into plain structs. Nothing is lazily loaded, so a
//! projection can be held across a long resolution run without touching
//! the database again.

pub mod build;
pub mod bus;
pub mod db;
pub mod dependency;
pub mod package;
pub mod repo;
