//! `web_research` tool: the research workflow as a rig tool
//!
//! An agent calls it with a health question and gets back the cited
//! markdown answer, footnote definitions included.

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::ResearchError;
use crate::research::ResearchWorkflow;

/// Input arguments for the web_research tool
#[derive(Debug, Deserialize, Serialize)]
pub struct WebResearchArgs {
    /// The pet-health question to research
    #[serde(alias = "query")]
    pub question: String,
}

#[derive(Clone)]
pub struct WebResearchTool {
    workflow: Arc<ResearchWorkflow>,
}

impl WebResearchTool {
    pub fn new(workflow: Arc<ResearchWorkflow>) -> Self {
        Self { workflow }
    }
}

impl Tool for WebResearchTool {
    const NAME: &'static str = "web_research";

    type Args = WebResearchArgs;
    type Output = String;
    type Error = ResearchError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Research a pet-health question on the web. Plans several searches, checks whether the evidence is sufficient, and returns a structured answer (possible causes, home care, when to see a vet) with numbered source citations. Use it for symptoms, behaviour and care questions; call it once per question.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The owner's question in their own words, including the animal and the symptom"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        info!(question = %args.question, "web_research tool called");
        let answer = self.workflow.run(&args.question).await?;
        Ok(answer.answer_md)
    }
}
