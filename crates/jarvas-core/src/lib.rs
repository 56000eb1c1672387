//! Core types for jarvas.
//!
//! This crate provides the domain types shared by the store and the HTTP service:
//!
//! - **Identifiers**: `UserId`, `GenerationId`
//! - **Accounts**: `Account`, `Profile`
//! - **History**: `Generation`, `ProcessedEvent`
//! - **Checkout**: `CreditPack`
//!
//! # Credits
//!
//! One credit pays for one enhancement. Balances are stored as `i64` and must
//! never go negative; all mutation goes through the ledger in `jarvas-store`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod generation;
pub mod ids;
pub mod pack;

pub use account::{Account, Profile, DEFAULT_SIGNUP_CREDITS};
pub use generation::{Generation, ProcessedEvent, HISTORY_PAGE_SIZE};
pub use ids::{GenerationId, IdError, UserId, MAX_USER_ID_LEN};
pub use pack::{default_packs, find_by_price_id, CreditPack};
