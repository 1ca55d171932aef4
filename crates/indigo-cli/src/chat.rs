//! `indigo chat` - terminal harness
//!
//! Prints every node update of a turn, nested agents included, as it
//! completes.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use indigo_core::ai::{Message, Role};
use indigo_core::{Assistant, IndigoConfig, Step};

pub async fn run(config: IndigoConfig, thread: &str) -> Result<()> {
    let assistant = Assistant::from_config(&config).await?;

    println!();
    println!("  \x1b[1;36mIndigo\x1b[0m (thread {thread}). Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let mut steps = match assistant.stream_turn(thread, message).await {
            Ok(steps) => steps,
            Err(busy) => {
                eprintln!("{busy}");
                continue;
            }
        };
        while let Some(step) = steps.next().await {
            print!("{}", render_step(&step));
        }
    }

    Ok(())
}

fn render_step(step: &Step) -> String {
    let mut out = format!(
        "\n---------- Update from {} node in {} ---------\n\n",
        step.node,
        step.namespace_label()
    );
    match step.update.messages.last() {
        Some(message) => out.push_str(&render_message(message)),
        None => out.push_str("(no new messages)\n"),
    }
    if let Some(helper) = step.update.helper_agent {
        let _ = writeln!(out, "\nNext: {helper}");
    }
    out
}

fn render_message(message: &Message) -> String {
    let title = match message.role {
        Role::System => "System Message",
        Role::User => "Human Message",
        Role::Assistant => "Ai Message",
        Role::Tool => "Tool Message",
    };
    let mut out = format!("{:=^80}\n", format!(" {title} "));
    if let Some(name) = &message.name {
        let _ = writeln!(out, "Name: {name}\n");
    }
    if !message.content.is_empty() {
        let _ = writeln!(out, "{}", message.content);
    }
    if !message.tool_calls.is_empty() {
        out.push_str("Tool Calls:\n");
        for call in &message.tool_calls {
            let _ = writeln!(out, "  {} ({})", call.name, call.id);
            let _ = writeln!(out, "    Args: {}", call.arguments);
        }
    }
    out
}
