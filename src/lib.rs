//! # Census Console
//!
//! An administrative console for household survey records kept by a remote
//! survey API.
//!
//! The API owns everything persistent: the field schema, the reference
//! lists (wards, castes, districts, ...), and the household records. This
//! crate is the client side of that contract. It composes forms from the
//! server's schema, assembles and submits new households, edits existing
//! ones, and flattens households into filterable family member rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Survey API  │◀─▶│ SurveyStore  │◀─▶│  form/draft  │
//! │ schema, refs │   │ HTTP/memory  │   │  edit/rows   │
//! │   records    │   └──────────────┘   └──────┬───────┘
//! └──────────────┘                             │
//!                                              ▼
//!                                     ┌──────────────────┐
//!                                     │ census CLI views │
//!                                     └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export CENSUS_API_BASE_URL=https://survey.example.org
//! census login --username admin
//! census form                                   # show the add form
//! census add --general "Head of Family=Ram" --member "Name=Sita;Age=31" --yes
//! census list --gotra-not Yadav --age 19-30
//! census show 65a1,65a2 --mode scrollable
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment override |
//! | [`error`] | API error type and error presentation classes |
//! | [`models`] | Schema, household records, reference entities |
//! | [`store`] | Survey API abstraction (HTTP and in-memory) |
//! | [`session`] | Session token persisted between runs |
//! | [`shell`] | Routes, access gating, confirmation |
//! | [`references`] | Reference list loading and management |
//! | [`fields`] | Schema loading and management |
//! | [`form`] | Form composer |
//! | [`draft`] | Add flow state machine |
//! | [`edit`] | Update flow |
//! | [`rows`] | Family member rows, filters, grouping |
//! | [`list`] | List and bulk delete commands |
//! | [`detail`] | Multi-household detail view |

pub mod config;
pub mod detail;
pub mod draft;
pub mod edit;
pub mod error;
pub mod fields;
pub mod form;
pub mod list;
pub mod models;
pub mod references;
pub mod rows;
pub mod session;
pub mod shell;
pub mod store;
