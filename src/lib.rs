//! # Contact Resolver
//!
//! **Resolves partial contact fragments into consolidated identities.**
//!
//! Each incoming fragment carries an email, a phone number, or both. Records
//! that share either field belong to one identity, represented by a single
//! primary contact and any number of secondaries linked to it. When a
//! fragment bridges two identities they are merged: the older primary
//! survives and the newer one, with all of its secondaries, is relinked
//! beneath it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ HTTP / CLI   │──▶│ Linkage Resolver │──▶│ ContactStore │
//! │ (axum, clap) │   │  (core crate)    │   │ SQLite / mem │
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!                             ▼
//!                    ┌──────────────────┐
//!                    │ ConsolidatedView │
//!                    └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! contact-resolver init                                  # create database
//! contact-resolver identify --email a@x.com --phone 111  # resolve one fragment
//! contact-resolver get 1                                 # show an identity
//! contact-resolver serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the contact store |
//! | [`identify`] | CLI resolution and lookup |
//! | [`server`] | HTTP server |
//!
//! The resolver, view builder, and store traits live in
//! [`contact_resolver_core`].

pub mod config;
pub mod db;
pub mod identify;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
