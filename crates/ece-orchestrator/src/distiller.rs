use crate::crew::{Analyst, Crew, CrewFailurePolicy, CrewOutput};
use ece_agent::LlmClient;
use ece_blackboard::Blackboard;
use ece_core::EceResult;
use std::sync::Arc;
use tracing::info;

/// Identity the distiller posts under.
pub const DISTILLER_AGENT: &str = "DistillerAgent";

const TECHNICAL: &str = "Analyze the following text and extract ONLY the key technical details, \
bugs, or architectural decisions.";
const PHILOSOPHICAL: &str = "Analyze the following text and extract ONLY the philosophical \
concepts about AI, consciousness, or symbiosis.";
const EMOTIONAL: &str = "Analyze the following text and describe ONLY the emotional sentiment or \
subtext (e.g., frustration, excitement, breakthrough).";
const INTEGRATOR: &str = "You are an Archivist. Your job is to synthesize the following analyses \
of a conversation into a single, rich archival summary.";

/// Condenses working memory through a crew and posts the summary.
pub struct Distiller {
    crew: Crew,
    blackboard: Blackboard,
}

impl Distiller {
    /// Distiller posting `crew` results to `blackboard`.
    pub fn new(crew: Crew, blackboard: Blackboard) -> Self {
        Self { crew, blackboard }
    }

    /// Technical, philosophical and emotional analysts on `analyst_llm`,
    /// synthesized by `integrator_llm`.
    pub fn with_default_crew(
        analyst_llm: Arc<LlmClient>,
        integrator_llm: Arc<LlmClient>,
        blackboard: Blackboard,
        policy: CrewFailurePolicy,
    ) -> Self {
        let analysts = vec![
            Analyst::new("technical", TECHNICAL, analyst_llm.clone()),
            Analyst::new("philosophical", PHILOSOPHICAL, analyst_llm.clone()),
            Analyst::new("emotional", EMOTIONAL, analyst_llm),
        ];
        let crew = Crew::new(analysts, integrator_llm, INTEGRATOR).with_policy(policy);
        Self::new(crew, blackboard)
    }

    /// The underlying crew.
    pub fn crew(&self) -> &Crew {
        &self.crew
    }

    /// Run the crew over `context` and post the result to the blackboard.
    pub async fn distill(&self, context: &str) -> EceResult<CrewOutput> {
        let output = self.crew.kickoff(context).await?;
        self.blackboard
            .post_message(DISTILLER_AGENT, output.result.clone())
            .await?;
        info!(chars = output.result.chars().count(), "Distillation posted");
        Ok(output)
    }
}
