//! Reference engine: executes a list of tool steps, gating each one.
//!
//! Every tool is a dry run that only describes what it would do. The
//! engine exists to drive the orchestrator end to end without a real
//! reasoning backend.
//!
//! Input:
//!
//! ```json
//! { "prompt": "delete /tmp/a /tmp/b; list /tmp",
//!   "plan": [{ "action": "read_file", "args": { "path": "notes.txt" } }] }
//! ```
//!
//! An explicit `plan` wins. Otherwise the prompt is split on `;` and
//! ` then ` and each clause is mapped to a tool by its leading verb.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use tollgate_approval::GateOutcome;

use super::{TaskContext, TaskEngine, TaskError};

/// What to do when a gated step is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// Record the step as denied and carry on with the rest of the plan.
    #[default]
    Skip,
    /// Fail the whole task.
    Abort,
}

impl fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for RejectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown rejection policy '{other}'")),
        }
    }
}

/// One tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Tool name.
    pub action: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: Value,
}

impl PlanStep {
    fn new(action: &str, args: Value) -> Self {
        Self {
            action: action.to_string(),
            args,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlanInput {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    plan: Option<Vec<PlanStep>>,
}

#[derive(Debug, Serialize)]
struct StepReport {
    action: String,
    status: &'static str,
    output: String,
}

/// Derive steps from a free-text prompt.
#[must_use]
pub fn plan_from_prompt(prompt: &str) -> Vec<PlanStep> {
    prompt
        .split(';')
        .flat_map(|part| part.split(" then "))
        .filter_map(|clause| {
            let clause = clause.trim();
            let (verb, rest) = clause
                .split_once(char::is_whitespace)
                .map_or((clause, ""), |(v, r)| (v, r.trim()));
            let step = match verb.to_ascii_lowercase().as_str() {
                "delete" | "remove" | "rm" => PlanStep::new(
                    "delete_files",
                    json!({ "paths": rest.split_whitespace().collect::<Vec<_>>() }),
                ),
                "run" | "execute" | "exec" => {
                    PlanStep::new("execute_command", json!({ "command": rest }))
                },
                "sql" | "query" => PlanStep::new("modify_database", json!({ "query": rest })),
                "list" | "ls" => {
                    let directory = if rest.is_empty() { "." } else { rest };
                    PlanStep::new("list_files", json!({ "directory": directory }))
                },
                "read" | "cat" => PlanStep::new("read_file", json!({ "path": rest })),
                _ => {
                    if !clause.is_empty() {
                        debug!(clause, "No tool matches clause, skipping");
                    }
                    return None;
                },
            };
            Some(step)
        })
        .collect()
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, TaskError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TaskError::InvalidInput(format!("missing string argument '{key}'")))
}

/// Run one tool. None of them touch the system.
fn run_tool(step: &PlanStep) -> Result<String, TaskError> {
    let args = &step.args;
    match step.action.as_str() {
        "delete_files" => {
            let paths: Vec<&str> = match args.get("paths") {
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                Some(Value::String(one)) => vec![one.as_str()],
                _ => return Err(TaskError::InvalidInput("missing argument 'paths'".into())),
            };
            Ok(format!("[DEMO] Would delete files: [{}]", paths.join(", ")))
        },
        "execute_command" => Ok(format!(
            "[DEMO] Would execute: {}",
            str_arg(args, "command")?
        )),
        "modify_database" => Ok(format!(
            "[DEMO] Would execute SQL: {}",
            str_arg(args, "query")?
        )),
        "list_files" => {
            let dir = args.get("directory").and_then(Value::as_str).unwrap_or(".");
            Ok(format!("Files in {dir}: file1.txt, file2.txt, file3.txt"))
        },
        "read_file" => Ok(format!(
            "Content of {}: Sample file content",
            str_arg(args, "path")?
        )),
        other => Err(TaskError::Failed(format!("unknown action '{other}'"))),
    }
}

/// Executes a plan of dry-run tools through the interrupt gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanEngine {
    policy: RejectionPolicy,
}

impl PlanEngine {
    /// Create an engine with the given rejection policy.
    #[must_use]
    pub fn new(policy: RejectionPolicy) -> Self {
        Self { policy }
    }

    /// The configured rejection policy.
    #[must_use]
    pub fn policy(&self) -> RejectionPolicy {
        self.policy
    }
}

#[async_trait]
impl TaskEngine for PlanEngine {
    async fn run(&self, input: Value, ctx: TaskContext) -> Result<Value, TaskError> {
        let input: PlanInput =
            serde_json::from_value(input).map_err(|e| TaskError::InvalidInput(e.to_string()))?;
        let steps = match input.plan {
            Some(plan) => plan,
            None => plan_from_prompt(&input.prompt),
        };

        let mut reports = Vec::with_capacity(steps.len());
        for step in &steps {
            let outcome = ctx.check(&step.action, step.args.clone()).await?;
            let report = match outcome {
                GateOutcome::Decision(ref d) if !d.is_approved() => {
                    let reason = d.rejection_reason().unwrap_or("rejected").to_string();
                    if self.policy == RejectionPolicy::Abort {
                        return Err(TaskError::Rejected {
                            action: step.action.clone(),
                            reason,
                        });
                    }
                    info!(session_id = %ctx.session_id(), action = %step.action, "Step denied, continuing");
                    StepReport {
                        action: step.action.clone(),
                        status: "denied",
                        output: format!("User denied execution of '{}'", step.action),
                    }
                },
                _ => StepReport {
                    action: step.action.clone(),
                    status: "executed",
                    output: run_tool(step)?,
                },
            };
            reports.push(report);
        }

        let executed = reports.iter().filter(|r| r.status == "executed").count();
        let message = format!("Executed {executed} of {} step(s)", reports.len());
        Ok(json!({
            "prompt": input.prompt,
            "steps": reports,
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_planner_maps_verbs() {
        let steps = plan_from_prompt("delete /tmp/a /tmp/b; list /tmp then run ls -la");
        let actions: Vec<_> = steps.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, vec!["delete_files", "list_files", "execute_command"]);
        assert_eq!(steps[0].args, json!({"paths": ["/tmp/a", "/tmp/b"]}));
        assert_eq!(steps[2].args, json!({"command": "ls -la"}));
    }

    #[test]
    fn test_prompt_planner_skips_unknown_clauses() {
        assert!(plan_from_prompt("hello there").is_empty());
        assert_eq!(plan_from_prompt("list")[0].args, json!({"directory": "."}));
    }

    #[test]
    fn test_tools_are_dry_runs() {
        let out = run_tool(&PlanStep::new("delete_files", json!({"paths": ["/tmp/*"]}))).unwrap();
        assert_eq!(out, "[DEMO] Would delete files: [/tmp/*]");
        let out = run_tool(&PlanStep::new("modify_database", json!({"query": "DROP t"}))).unwrap();
        assert_eq!(out, "[DEMO] Would execute SQL: DROP t");
        assert!(run_tool(&PlanStep::new("format_disk", json!({}))).is_err());
        assert!(run_tool(&PlanStep::new("read_file", json!({}))).is_err());
    }

    #[test]
    fn test_rejection_policy_parses() {
        assert_eq!("Abort".parse::<RejectionPolicy>(), Ok(RejectionPolicy::Abort));
        assert!("later".parse::<RejectionPolicy>().is_err());
    }
}
