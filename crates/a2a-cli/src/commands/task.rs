//! `a2a send|stream|get|cancel|resubscribe` — talk to an agent.

use a2a_rpc::{
    A2AClient, Message, Task, TaskEvent, TaskEventStream, TaskSendParams, TaskState,
};
use clap::Args;
use colored::Colorize;
use futures::StreamExt;

use super::{print_json, OutputFormat};

#[derive(Args)]
pub struct SendArgs {
    /// Message text.
    pub text: String,

    /// Continue an existing task instead of starting a new one.
    #[arg(long, short)]
    pub task_id: Option<String>,

    /// Session id to group related tasks.
    #[arg(long, short)]
    pub session_id: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Task id.
    pub id: String,

    /// Only show the newest N history messages.
    #[arg(long)]
    pub history_length: Option<u32>,
}

#[derive(Args)]
pub struct IdArgs {
    /// Task id.
    pub id: String,
}

fn send_params(args: SendArgs) -> TaskSendParams {
    let message = Message::user_text(args.text);
    let mut params = match args.task_id {
        Some(id) => TaskSendParams::for_task(id, message),
        None => TaskSendParams::new(message),
    };
    params.session_id = args.session_id;
    params
}

pub async fn send(client: &A2AClient, args: SendArgs, output: OutputFormat) -> anyhow::Result<()> {
    let task = client.send_task(send_params(args)).await?;
    print_task(&task, output)
}

pub async fn stream(
    client: &A2AClient,
    args: SendArgs,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let params = send_params(args);
    if let OutputFormat::Text = output {
        println!("\n  {} Task {}\n", "→".dimmed(), params.id.cyan());
    }
    let events = client.send_task_subscribe(params).await?;
    print_events(events, output).await
}

pub async fn get(client: &A2AClient, args: GetArgs, output: OutputFormat) -> anyhow::Result<()> {
    let task = client.get_task(&args.id, args.history_length).await?;
    print_task(&task, output)
}

pub async fn cancel(client: &A2AClient, args: IdArgs, output: OutputFormat) -> anyhow::Result<()> {
    let task = client.cancel_task(&args.id).await?;
    print_task(&task, output)
}

pub async fn resubscribe(
    client: &A2AClient,
    args: IdArgs,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let events = client.resubscribe_task(&args.id).await?;
    print_events(events, output).await
}

async fn print_events(mut events: TaskEventStream, output: OutputFormat) -> anyhow::Result<()> {
    while let Some(event) = events.next().await {
        let event = event?;
        match output {
            OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
            OutputFormat::Text => print_event(&event),
        }
    }
    Ok(())
}

fn print_event(event: &TaskEvent) {
    match event {
        TaskEvent::Status(update) => {
            let marker = if update.is_final { " (final)" } else { "" };
            println!(
                "  {} {}{}",
                "status".dimmed(),
                colored_state(update.status.state),
                marker.dimmed()
            );
            if let Some(message) = &update.status.message {
                println!("    {}", message.text_content());
            }
        }
        TaskEvent::Artifact(update) => {
            let artifact = &update.artifact;
            let name = artifact.name.as_deref().unwrap_or("artifact");
            println!(
                "  {} {}[{}] {}",
                "artifact".dimmed(),
                name.cyan(),
                artifact.index,
                artifact.text_content()
            );
        }
    }
}

fn print_task(task: &Task, output: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = output {
        return print_json(task);
    }

    println!();
    println!("  {}  {}", "Task:".bold(), task.id.cyan());
    if let Some(session) = &task.session_id {
        println!("  {}  {}", "Session:".bold(), session);
    }
    println!("  {}  {}", "State:".bold(), colored_state(task.state()));
    if let Some(timestamp) = task.status.timestamp {
        println!("  {}  {}", "Updated:".bold(), timestamp.to_rfc3339().dimmed());
    }
    if let Some(message) = &task.status.message {
        println!("  {}  {}", "Reply:".bold(), message.text_content());
    }
    for artifact in &task.artifacts {
        let name = artifact.name.as_deref().unwrap_or("artifact");
        println!(
            "  {}  {}[{}] {}",
            "Artifact:".bold(),
            name.cyan(),
            artifact.index,
            artifact.text_content()
        );
    }
    if !task.history.is_empty() {
        println!("  {}  {} messages", "History:".bold(), task.history.len());
    }
    println!();
    Ok(())
}

fn colored_state(state: TaskState) -> colored::ColoredString {
    let label = state.to_string();
    match state {
        TaskState::Completed => label.green().bold(),
        TaskState::Failed => label.red().bold(),
        TaskState::Canceled => label.yellow(),
        TaskState::InputRequired => label.magenta(),
        TaskState::Working | TaskState::Submitted => label.blue(),
        TaskState::Unknown => label.dimmed(),
    }
}
