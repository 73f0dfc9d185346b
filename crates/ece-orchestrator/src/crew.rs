use ece_agent::LlmClient;
use ece_core::{EceError, EceResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// One independent analysis in a crew's fan-out.
#[derive(Clone)]
pub struct Analyst {
    /// Role name, used in the synthesis prompt and in failures.
    pub name: String,
    /// Prepended to the input document.
    pub instruction: String,
    llm: Arc<LlmClient>,
}

impl Analyst {
    /// Analyst named `name` prompting `llm` with `instruction`.
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, llm: Arc<LlmClient>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            llm,
        }
    }

    async fn analyze(&self, input: &str) -> EceResult<String> {
        let prompt = format!("{} Text: {input}", self.instruction);
        Ok(self.llm.generate(&prompt).await?.trim().to_string())
    }
}

/// What to do when one analysis fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewFailurePolicy {
    /// Cancel the remaining analyses and fail the invocation.
    #[default]
    Abort,
    /// Synthesize from whatever succeeded; the failed role contributes nothing.
    Degrade,
}

/// `[crew]` section of the engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewConfig {
    /// Behaviour when one analysis fails.
    #[serde(default)]
    pub failure_policy: CrewFailurePolicy,
}

/// Terminal status of a crew invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewStatus {
    /// Synthesis produced a result.
    Success,
}

/// What a caller gets back from [`Crew::kickoff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Terminal status.
    pub status: CrewStatus,
    /// Synthesized text.
    pub result: String,
    /// Analysts whose output was replaced by an empty string.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_roles: Vec<String>,
}

/// Fan-out of N analysts over one document, then a single synthesis call.
///
/// The synthesis call never starts before every analysis has either returned
/// or been accounted for as failed.
pub struct Crew {
    analysts: Vec<Analyst>,
    integrator: Arc<LlmClient>,
    synthesis_instruction: String,
    policy: CrewFailurePolicy,
}

impl Crew {
    /// Crew of `analysts` whose outputs `integrator` synthesizes.
    pub fn new(
        analysts: Vec<Analyst>,
        integrator: Arc<LlmClient>,
        synthesis_instruction: impl Into<String>,
    ) -> Self {
        Self {
            analysts,
            integrator,
            synthesis_instruction: synthesis_instruction.into(),
            policy: CrewFailurePolicy::default(),
        }
    }

    /// Set the failure policy.
    pub fn with_policy(mut self, policy: CrewFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current failure policy.
    pub fn policy(&self) -> CrewFailurePolicy {
        self.policy
    }

    /// Analysts in declaration order.
    pub fn analysts(&self) -> &[Analyst] {
        &self.analysts
    }

    /// Run every analyst concurrently on `input`, join, then synthesize.
    pub async fn kickoff(&self, input: &str) -> EceResult<CrewOutput> {
        if self.analysts.is_empty() {
            return Err(EceError::Crew("Crew has no analysts".into()));
        }
        let total = self.analysts.len();
        info!(analysts = total, policy = ?self.policy, "Crew: beginning parallel analysis");

        let input: Arc<str> = Arc::from(input);
        let mut join_set = JoinSet::new();

        // SCATTER
        for (idx, analyst) in self.analysts.iter().cloned().enumerate() {
            let input = input.clone();
            join_set.spawn(async move { (idx, analyst.analyze(&input).await) });
        }

        // GATHER: slot by declaration order, not completion order
        let mut outputs: Vec<Option<String>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            let (idx, reason) = match joined {
                Ok((idx, Ok(text))) => {
                    outputs[idx] = Some(text);
                    continue;
                }
                Ok((idx, Err(e))) => (Some(idx), e.to_string()),
                Err(e) => (None, format!("analysis task panicked: {e}")),
            };
            let role = idx.map_or("<unknown>", |i| self.analysts[i].name.as_str());

            match self.policy {
                CrewFailurePolicy::Abort => {
                    join_set.abort_all();
                    return Err(EceError::Crew(format!("Analyst '{role}' failed: {reason}")));
                }
                CrewFailurePolicy::Degrade => {
                    warn!(role = %role, error = %reason, "Crew: analysis failed, continuing without it");
                }
            }
        }

        let failed_roles: Vec<String> = self
            .analysts
            .iter()
            .zip(&outputs)
            .filter(|(_, out)| out.is_none())
            .map(|(analyst, _)| analyst.name.clone())
            .collect();
        if failed_roles.len() == total {
            return Err(EceError::Crew("Every analysis failed".into()));
        }

        info!(failed = failed_roles.len(), "Crew: analysis complete, synthesizing");

        let mut prompt = format!("{}\n\n", self.synthesis_instruction);
        for (analyst, out) in self.analysts.iter().zip(&outputs) {
            prompt.push_str(&format!("- {}: {}\n", analyst.name, out.as_deref().unwrap_or("")));
        }
        prompt.push_str("\nSynthesize these points into a comprehensive summary:");

        let result = self
            .integrator
            .generate(&prompt)
            .await
            .map_err(|e| EceError::Crew(format!("Synthesis failed: {e}")))?;

        info!("Crew: synthesis complete");
        Ok(CrewOutput {
            status: CrewStatus::Success,
            result: result.trim().to_string(),
            failed_roles,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_output_wire_shape() {
        let output = CrewOutput {
            status: CrewStatus::Success,
            result: "summary".into(),
            failed_roles: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            serde_json::json!({"status": "success", "result": "summary"})
        );

        let degraded = CrewOutput {
            failed_roles: vec!["emotional".into()],
            ..output
        };
        assert_eq!(
            serde_json::to_value(&degraded).unwrap()["failed_roles"],
            serde_json::json!(["emotional"])
        );
    }

    #[test]
    fn test_policy_default_and_names() {
        assert_eq!(CrewFailurePolicy::default(), CrewFailurePolicy::Abort);
        let parsed: CrewFailurePolicy = serde_json::from_str("\"degrade\"").unwrap();
        assert_eq!(parsed, CrewFailurePolicy::Degrade);
    }
}
