//! Rig tools exposing the research workflow to agents

pub mod web_research;

pub use web_research::{WebResearchArgs, WebResearchTool};
