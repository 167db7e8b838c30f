//! Reconciliation for fwsync
//!
//! The engine orchestrates:
//! 1. Refreshing - Re-read every tracked object from the manager
//! 2. Planning - Compare the manifest with refreshed state
//! 3. Executing - Apply changes, one writer per remote document

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::display_plan;
pub use executor::{AutoConfirm, Confirm, ExecuteOptions, PromptConfirm, execute};
pub use planner::{plan, plan_destroy, refresh};
