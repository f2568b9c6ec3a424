//! Echo Bot Example
//!
//! A small bot built on courier's dispatcher.
//!
//! # Handler Chains
//!
//! Each update kind has its own ordered chain of `(matcher, handler)` pairs:
//! - A handler runs only when its matcher accepts the update
//! - Returning `Flow::Stop` skips the rest of the chain
//!
//! ```text
//! message:        log (always) → /start → /ping → /help → echo (private text)
//! edited_message: note the edit
//! callback_query: answer "echo:" buttons
//! ```
//!
//! # Usage
//!
//! ```bash
//! COURIER_BOT__API_TOKEN=123:abc cargo run --package echo-bot
//! cargo run --package echo-bot -- --config bot.toml --profile production
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use courier::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echoes private messages back to their sender")]
struct Args {
    /// Configuration file to load in addition to the search paths.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production or a custom name).
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Logs every message and lets the chain continue.
async fn log_message(ctx: Arc<Context>) -> HandlerResult {
    info!(
        chat_id = ?ctx.chat_id(),
        from = ?ctx.sender_id(),
        text = ctx.text().unwrap_or("<no text>"),
        "Message received"
    );
    Ok(Flow::Continue)
}

async fn start(ctx: Arc<Context>) -> HandlerResult {
    let name = ctx.bot().username().unwrap_or("echo bot");
    ctx.reply_text(format!("Hi! I'm @{name}. Send me anything and I'll send it back."))
        .await?;
    Ok(Flow::Stop)
}

async fn ping(ctx: Arc<Context>) -> HandlerResult {
    ctx.reply_text("Pong! 🏓").await?;
    Ok(Flow::Stop)
}

/// Sends the command list with an inline button.
async fn help(ctx: Arc<Context>) -> HandlerResult {
    let Some(chat_id) = ctx.chat_id() else {
        return Ok(Flow::Stop);
    };
    let help_text = r"╭─────────────────────────────╮
│     Echo Bot - Commands     │
├─────────────────────────────┤
│ /start - Greeting           │
│ /ping  - Pong!              │
│ /help  - This help          │
│ <text> - Echo (private)     │
╰─────────────────────────────╯";
    let button = Object::new()
        .with("text", "Echo this")
        .with("callback_data", "echo:help");
    let markup = Object::new().with(
        "inline_keyboard",
        Value::Array(vec![Value::Array(vec![Value::Object(button)])]),
    );

    ctx.bot()
        .send_message(
            Params::new()
                .with("chat_id", chat_id)
                .with("text", help_text)
                .with("reply_markup", markup),
        )
        .await?;
    Ok(Flow::Stop)
}

async fn echo(ctx: Arc<Context>) -> HandlerResult {
    if let Some(text) = ctx.text() {
        ctx.reply_text(text).await?;
    }
    Ok(Flow::Stop)
}

async fn edited(ctx: Arc<Context>) -> HandlerResult {
    info!(chat_id = ?ctx.chat_id(), "Message edited");
    Ok(Flow::Continue)
}

async fn answer_echo_button(ctx: Arc<Context>) -> HandlerResult {
    let payload = ctx.payload();
    let id = payload.get_str("id")?;
    let data = payload.get_str("data")?;
    let text = data.strip_prefix("echo:").unwrap_or(data);

    ctx.bot()
        .answer_callback_query(
            Params::new()
                .with("callback_query_id", id)
                .with("text", text),
        )
        .await?;
    Ok(Flow::Stop)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let dispatcher = Dispatcher::builder()
        .on_message(always(), log_message)
        .on_message(has_command("/start"), start)
        .on_message(has_command("/ping"), ping)
        .on_message(has_command("/help"), help)
        .on_message(and([is_private(), has_text()]), echo)
        .on_edited_message(has_text(), edited)
        .on_callback_query(callback_data("echo:"), answer_echo_button)
        .build();

    let mut builder = CourierRuntime::builder().dispatcher(dispatcher);
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    let stats = builder.build()?.run().await?;
    info!(
        completed = stats.completed,
        failed = stats.failed,
        "Echo bot stopped"
    );

    Ok(())
}
