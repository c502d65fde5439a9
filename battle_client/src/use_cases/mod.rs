// Use cases layer: state tracking and the dashboard session workflow.

pub mod dashboard;
pub mod state_store;

pub use dashboard::{
    DashboardEvent, DashboardOutputs, DashboardSession, DashboardSettings, DashboardView,
    RankingRow, SessionHandle,
};
pub use state_store::{Notifications, StateStore};
