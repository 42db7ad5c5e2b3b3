//! Gateway-local tools — built-ins that need access to gateway state
//! beyond what `gw-tools`'s `ToolContext` exposes.

pub mod schedule_tool;

pub use schedule_tool::ScheduleTool;
