//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions such as autocomplete,
//! button prompts and paginated views.

/// Autocomplete handlers for transaction IDs, bet choices and saved throws
pub mod autocomplete;
/// Confirm / cancel button prompts
pub mod confirm;
/// Paginated transaction history view
pub mod pagination;
