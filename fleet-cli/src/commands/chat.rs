//! `chat`/`ask` (spec §4.8 / C8): drives the Streaming Chat Pipeline.
//!
//! One-shot invocation (`fleet chat "question"`) runs "ask one question" mode - non-streaming,
//! the final reply printed once it is complete. With no message, `fleet chat` opens an
//! interactive session: each line of input is one turn, streamed token-by-token to stdout
//! (spec §6 "Chat requests in 'ask one question' mode follow C8 non-streaming; interactive
//! sessions use streaming").

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use fleet::{ChatPipeline, FleetError, Message, Supervisor};
use stream_event::ProtocolEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::shared;
use crate::paths;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The question to ask. Omit to start an interactive session.
    pub message: Option<String>,
    /// Bypass the Memory Safety Gate when starting the active backend.
    #[arg(long)]
    pub force: bool,
    /// Optional system prompt prepended to the conversation.
    #[arg(long)]
    pub system: Option<String>,
}

pub async fn run(args: ChatArgs) -> Result<(), FleetError> {
    let (config, registry) = shared::load_all()?;
    let dispatcher = fleet::build_dispatcher(&registry, &paths::working_dir());
    let supervisor = Arc::new(Supervisor::new(paths::cache_dir()));
    let pipeline = ChatPipeline::new(reqwest::Client::new());
    let system = sysinfo::System::new_all();

    let mut history = Vec::new();
    if let Some(system_prompt) = &args.system {
        history.push(Message::system(system_prompt.clone()));
    }

    match args.message {
        Some(text) => {
            history.push(Message::user(text));
            let reply = pipeline
                .run_buffered(
                    &config,
                    &supervisor,
                    &registry,
                    &dispatcher,
                    &system,
                    history,
                    args.force,
                    None,
                )
                .await?;
            println!("{reply}");
            Ok(())
        }
        None => {
            run_interactive(
                &pipeline,
                &config,
                &supervisor,
                &registry,
                &dispatcher,
                &system,
                history,
                args.force,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_interactive(
    pipeline: &ChatPipeline,
    config: &config::Config,
    supervisor: &Arc<Supervisor>,
    registry: &fleet::ToolRegistry,
    dispatcher: &fleet::ToolDispatcher,
    system: &sysinfo::System,
    mut history: Vec<Message>,
    force: bool,
) -> Result<(), FleetError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await.unwrap_or(None) else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        history.push(Message::user(line));

        let (tx, mut rx) = mpsc::channel::<ProtocolEvent>(256);
        let cancel = CancellationToken::new();
        let reply = {
            let drain = tokio::spawn(async move {
                let mut final_reply = None;
                while let Some(event) = rx.recv().await {
                    match event {
                        ProtocolEvent::TokenDelta { content } => {
                            print!("{content}");
                            std::io::stdout().flush().ok();
                        }
                        ProtocolEvent::RunEnd { reply } => final_reply = Some(reply),
                        ProtocolEvent::Error { message, .. } => {
                            eprintln!("\nfleet: {message}");
                        }
                        _ => {}
                    }
                }
                final_reply
            });
            let result = pipeline
                .run(
                    config,
                    supervisor,
                    registry,
                    dispatcher,
                    system,
                    history.clone(),
                    force,
                    None,
                    &cancel,
                    tx,
                )
                .await;
            let final_reply = drain.await.unwrap_or(None);
            println!();
            match result {
                Ok(reply) => Some(reply),
                Err(e) => {
                    eprintln!("fleet: {e}");
                    final_reply
                }
            }
        };

        if let Some(reply) = reply {
            history.push(Message::assistant(reply));
        } else {
            history.pop();
        }
    }
    Ok(())
}
