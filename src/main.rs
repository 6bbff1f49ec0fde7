use std::path::PathBuf;

use async_trait::async_trait;

use agent_fleet::agent::{Agent, Capability, HandlerError, TaskHandler};
use agent_fleet::config::OrchestratorConfig;
use agent_fleet::orchestrator::{MasterPlayer, TaskRequest};
use agent_fleet::task::{Horizon, Priority, Task, TaskOutcome};

/// Turns a task's subtasks into an ordered plan.
struct PlanningHandler;

#[async_trait]
impl TaskHandler for PlanningHandler {
    fn kind(&self) -> &str {
        "planner"
    }

    async fn perform(&self, task: &Task) -> Result<TaskOutcome, HandlerError> {
        if task.subtasks.is_empty() {
            return Err(HandlerError::MissingInput {
                field: "subtasks".to_string(),
                reason: "nothing to plan".to_string(),
            });
        }

        let steps: Vec<String> = task
            .subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.name))
            .collect();

        Ok(TaskOutcome::new(format!("Planned task: {}", task.name))
            .with_details(steps.join("\n"))
            .with_artifact("plan", serde_json::json!(steps)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = OrchestratorConfig::load(config_path.as_deref())?.from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    eprintln!("Agent Fleet v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", config.data_dir.display());
    eprintln!("   Max agents: {}\n", config.max_agents);

    let master = MasterPlayer::on_disk(config);
    master.start().await?;
    master.register_component("agent-manager").await;

    master
        .register_agent(
            Agent::with_handler(
                "Planner",
                [Capability::TaskPlanning, Capability::TextProcessing],
                PlanningHandler,
            ),
            None,
        )
        .await?;
    master
        .register_agent(
            Agent::new(
                "Coder",
                [Capability::CodeGeneration, Capability::FileOperations],
            ),
            None,
        )
        .await?;

    let mut plan = master
        .create_task(
            TaskRequest::new("Plan release")
                .with_description("Break the release into steps")
                .with_priority(Priority::High)
                .requiring(Capability::TaskPlanning)
                .with_subtask("Freeze features")
                .with_subtask("Cut release branch")
                .with_subtask("Publish"),
        )
        .await?;
    let result = master.execute_task(&mut plan).await?;
    eprintln!("{} -> {}", plan.name, result.summary);

    let mut batch = vec![
        master
            .create_task(
                TaskRequest::new("Generate parser")
                    .requiring(Capability::CodeGeneration)
                    .with_subtask("Lexer")
                    .with_subtask("Grammar"),
            )
            .await?,
        master
            .create_task(
                TaskRequest::new("Search docs")
                    .with_horizon(Horizon::H2)
                    .requiring(Capability::WebSearch),
            )
            .await?,
    ];
    let results = master.execute_batch(&mut batch, false).await?;
    for task in &batch {
        if let Some(result) = task.id().and_then(|id| results.get(&id)) {
            eprintln!("{} -> {}", task.name, result.summary);
        }
    }

    eprintln!("\nAgent performance:");
    for perf in master.get_agent_performance().await {
        eprintln!(
            "   {}: {}/{} succeeded, avg {:.3}s",
            perf.agent_name, perf.completed_tasks, perf.total_tasks, perf.avg_duration
        );
    }

    let ownership = master.get_ownership_report().await;
    eprintln!("\nTotal owned: {}", ownership.total_owned);
    eprintln!("   Agents: {}", ownership.num_agents);
    eprintln!("   Tasks: {}", ownership.num_tasks);
    eprintln!("   Resources: {}", ownership.num_resources);
    eprintln!("   Components: {}", ownership.num_components);

    master.stop().await;
    Ok(())
}
