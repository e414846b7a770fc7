//! Accounts Store — PostgreSQL implementation of the projection store.

pub mod pg_projection_store;
pub mod schema;
