//! Record gateway: schema-aware query, enrichment and update over a
//! document store.
//!
//! ## Overview
//!
//! Every record type is described by a [`docgate_common::RecordSchema`]
//! held in the store itself. Handlers never know about concrete types; they
//! read the schema at request time and dispatch on field kinds to decide
//! which values to validate, expand or write.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (Router, ServerConfig, open_store)   │
//! │          │ <─────── │    └─ api.rs  (handlers, AppState, Envelope)     │
//! └──────────┘ envelope │         │ params.rs  (flat map → requests)       │
//!                       │         v                                        │
//!                       │  service.rs  (Gateway: list_info, list_data,     │
//!                       │               single_data, delete_data,          │
//!                       │               update_raw, update_validated,      │
//!                       │               insert)                            │
//!                       │     │ enrich.rs    (options, links, sub-fields)  │
//!                       │     │ validate.rs  (coercion, mandatory, links)  │
//!                       │     │ naming.rs    (autoname rules)              │
//!                       │     │ hooks.rs     (lifecycle hooks)             │
//!                       │     v                                            │
//!                       │  store.rs  (DocumentStore trait, query.rs)       │
//!                       │     └─ db.rs  (SqliteStore, StoreHandle)         │
//!                       │  registry.rs  (schema files → define_type)       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! The SQLite connection sits behind a `std::sync::Mutex` inside
//! [`db::StoreHandle`]; each request runs its whole gateway operation on the
//! blocking pool while holding the lock, so one operation's reads and
//! writes are never interleaved with another's.

pub mod api;
pub mod context;
pub mod db;
pub mod enrich;
pub mod hooks;
pub mod naming;
pub mod params;
pub mod query;
pub mod registry;
pub mod server;
pub mod service;
pub mod store;
pub mod validate;
