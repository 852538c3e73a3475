//! Neural Architecture Search (NAS) reward evaluation
//!
//! The controller lives elsewhere; this module scores what it proposes:
//! - Network manager: actions in, validation-accuracy reward out
//! - Stock dense model function
//! - Search history log and architecture ranking

pub mod action;
mod builder;
mod config;
pub mod history;
mod manager;

pub use action::{parse_actions, ActionValue};
pub use builder::DenseActionBuilder;
pub use config::ManagerConfig;
pub use history::{append_record, parse_history, rank, read_history, HistoryField, HistoryRecord};
pub use manager::{CandidateEvaluation, NetworkManager};
