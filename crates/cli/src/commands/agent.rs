//! `wayfarer agent` - Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use wayfarer_agent::{StreamEvent, StreamMode, TurnOrchestrator};
use wayfarer_config::AppConfig;
use wayfarer_core::event::{DomainEvent, EventBus};
use wayfarer_core::memory::SummaryUpdate;

pub async fn run(
    message: Option<String>,
    session: String,
    stream: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early - give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'");
        eprintln!("    GROQ_API_KEY       = 'gsk_...'   (with WAYFARER_PROVIDER=groq)");
        eprintln!("    WAYFARER_API_KEY   = '...'       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let event_bus = Arc::new(EventBus::default());
    if verbose {
        spawn_event_logger(&event_bus);
    }
    let orchestrator = wayfarer_gateway::build_orchestrator(&config, event_bus)?;

    if let Some(msg) = message {
        // Single message mode
        chat_once(&orchestrator, &session, &msg, stream).await?;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Wayfarer Agent — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", wayfarer_providers::router::resolve_model(&config));
    println!("  Tools:     WeatherTool, TimeTool, CityFactsTool");
    println!("  Session:   {session}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Commands: /memory, /summary, /clear. Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "/memory" => show_memory(&orchestrator, &session).await,
            "/summary" => {
                let update = orchestrator.memory().update_summary(&session).await;
                match &update {
                    SummaryUpdate::Updated(summary) => println!("  Summary > {summary}"),
                    SummaryUpdate::NotNeeded => println!("  {}", update.message()),
                }
            }
            "/clear" => {
                orchestrator.memory().clear(&session).await;
                println!("  Conversation memory cleared.");
            }
            _ => {
                if let Err(e) = chat_once(&orchestrator, &session, input, stream).await {
                    eprintln!("  [Error] {e}");
                }
            }
        }
        println!();
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn chat_once(
    orchestrator: &Arc<TurnOrchestrator>,
    session: &str,
    message: &str,
    stream: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if stream {
        return render_stream(orchestrator, session, message).await;
    }

    eprint!("  Thinking...");
    let outcome = orchestrator.run_turn(session, message).await;
    eprint!("\r              \r");
    let outcome = outcome?;

    for call in &outcome.result.function_calls {
        println!("  [{} → {}]", call.tool, call.parameters.city);
    }
    for line in outcome.result.response.lines() {
        println!("  Assistant > {line}");
    }
    Ok(())
}

/// Print a streamed turn: thinking on stderr, answer on stdout.
async fn render_stream(
    orchestrator: &Arc<TurnOrchestrator>,
    session: &str,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = orchestrator.run_turn_stream(session, message, StreamMode::Messages);
    let mut stdout = std::io::stdout();
    let mut answering = false;

    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Thinking { content } => eprint!("{content}"),
            StreamEvent::ToolSeparator { content, .. } => eprint!("{content}"),
            StreamEvent::Token { content } => {
                if !answering {
                    answering = true;
                    print!("\n  Assistant > ");
                }
                print!("{content}");
                stdout.flush()?;
            }
            StreamEvent::Error { content } => eprintln!("\n  [Error] {content}"),
            StreamEvent::StructuredOutput { .. } => println!(),
            StreamEvent::StructuredUpdate { .. }
            | StreamEvent::ToolUsage { .. }
            | StreamEvent::Final { .. } => {}
        }
    }
    Ok(())
}

async fn show_memory(orchestrator: &Arc<TurnOrchestrator>, session: &str) {
    let snapshot = orchestrator.memory().read(session).await;
    println!("  Session:        {}", snapshot.session_id);
    println!("  Messages:       {} held, {} total", snapshot.recent_messages.len(), snapshot.stats.total_messages);
    println!("  Summarized:     {} time(s)", snapshot.stats.summarization_count);
    println!("  Threshold:      {} exchanges", snapshot.stats.summarization_threshold);
    if !snapshot.summary.is_empty() {
        println!("  Summary:        {}", snapshot.summary);
    }
}

/// Log domain events as they happen.
fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event.as_ref() {
                DomainEvent::ToolInvoked {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => tracing::debug!(tool = %tool_name, success, duration_ms, "Tool invoked"),
                DomainEvent::SessionSummarized {
                    session_id,
                    strategy,
                    summarization_count,
                    ..
                } => tracing::debug!(session_id = %session_id, strategy = %strategy, summarization_count, "Session summarized"),
                DomainEvent::TurnCompleted {
                    session_id,
                    completion,
                    tool_calls,
                    ..
                } => tracing::debug!(session_id = %session_id, completion = %completion, tool_calls, "Turn completed"),
                DomainEvent::SessionCleared { session_id, .. } => {
                    tracing::debug!(session_id = %session_id, "Session cleared")
                }
                DomainEvent::ErrorOccurred {
                    context,
                    error_message,
                    ..
                } => tracing::debug!(context = %context, error = %error_message, "Error reported"),
            }
        }
    });
}
