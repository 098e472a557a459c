use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use crate::ai::{MessageExchangeService, Model, TitleSummarizer, load_models};
use crate::core::{AppConfig, db::async_db};
use crate::openai::{BoxedCompletionClient, OpenAiClient, Role};
use crate::store::{Conversation, ConversationStore, SqliteStorage, StoreError};

const HELP: &str = "\
Type a message to send it to the selected conversation.
  /new               start a new conversation
  /list              list conversations
  /select <n>        switch to conversation n
  /delete <n>        delete conversation n
  /model <id>        use model <id> for the selected conversation
  /models            list available models
  /history           show the messages of the selected conversation
  /edit <n> <text>   replace message n and resend from there
  /help              show this help
  /quit              exit";

#[derive(Debug, PartialEq)]
enum Input {
    New,
    List,
    Select(usize),
    Delete(usize),
    Model(String),
    Models,
    History,
    Edit(usize, String),
    Help,
    Quit,
    Send(String),
}

/// Parses one line of input. Positions are typed 1-based, as printed
/// by `/list` and `/history`, and returned 0-based.
fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Send(line.to_string()));
    };
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "new" => Ok(Input::New),
        "list" => Ok(Input::List),
        "select" => parse_position(rest).map(Input::Select),
        "delete" => parse_position(rest).map(Input::Delete),
        "model" if rest.is_empty() => Err("usage: /model <id>".to_string()),
        "model" => Ok(Input::Model(rest.to_string())),
        "models" => Ok(Input::Models),
        "history" => Ok(Input::History),
        "edit" => {
            let (position, text) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: /edit <n> <text>".to_string())?;
            Ok(Input::Edit(parse_position(position)?, text.trim().to_string()))
        }
        "help" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command /{}, try /help", other)),
    }
}

fn parse_position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("expected a position starting at 1, got {:?}", arg)),
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    // Keep the terminal for the conversation, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}=warn", env!("CARGO_CRATE_NAME")))
        }))
        .with_writer(std::io::stderr)
        .init();

    let models = load_models(config.catalog_url.as_deref()).await;
    let db = async_db(&config.storage_path).await?;
    let client: BoxedCompletionClient = Arc::new(OpenAiClient::new(
        &config.api_base_url,
        &config.api_key,
        config.request_timeout,
    ));
    let store = ConversationStore::open(
        Arc::new(SqliteStorage::new(db)),
        MessageExchangeService::new(Arc::clone(&client), config.temperature)
            .with_timeout(config.request_timeout),
        TitleSummarizer::new(client, &config.summary_model),
        &config.default_model,
    )
    .await;

    let mut rl = DefaultEditor::new()?;
    println!("{}", HELP);
    if let Some(conversation) = store.current_conversation() {
        println!("Continuing \"{}\"", conversation.title);
    }

    loop {
        let readline = rl.readline(&format!("[{}] >>> ", store.active_model()));
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::debug!("Failed to record input history: {}", e);
                }
                match parse_input(&line) {
                    Ok(Input::Quit) => break,
                    Ok(input) => handle_input(&store, &models, input).await,
                    Err(msg) => println!("{}", msg),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

async fn handle_input(store: &ConversationStore, models: &[Model], input: Input) {
    match input {
        Input::New => {
            let conversation = store.create_conversation(&store.active_model()).await;
            println!("Started a new conversation with {}", conversation.model);
        }
        Input::List => print_conversations(store),
        Input::Select(position) => {
            let Some(conversation) = store.conversations().get(position).cloned() else {
                println!("No conversation at {}", position + 1);
                return;
            };
            store.select_conversation(&conversation.id);
            println!("Switched to \"{}\" ({})", conversation.title, conversation.model);
        }
        Input::Delete(position) => {
            let Some(conversation) = store.conversations().get(position).cloned() else {
                println!("No conversation at {}", position + 1);
                return;
            };
            store.delete_conversation(&conversation.id).await;
            println!("Deleted \"{}\"", conversation.title);
        }
        Input::Model(id) => {
            if models.iter().any(|m| m.id == id) {
                store.set_active_model(&id).await;
                println!("Using {}", id);
            } else {
                println!("Unknown model {}, see /models", id);
            }
        }
        Input::Models => {
            let active = store.active_model();
            for model in models {
                let marker = if model.id == active { "*" } else { " " };
                println!("{} {:<24} {}", marker, model.id, model.description);
            }
        }
        Input::History => print_history(store),
        Input::Edit(position, text) => {
            let Some(conversation) = store.current_conversation() else {
                println!("No conversation selected");
                return;
            };
            let Some(message) = conversation.messages.get(position) else {
                println!("No message at {}", position + 1);
                return;
            };
            print_reply(store.edit_message(&conversation.id, &message.id, &text).await);
        }
        Input::Send(text) => print_reply(store.send_message(&text).await),
        Input::Help => println!("{}", HELP),
        Input::Quit => {}
    }
}

fn print_conversations(store: &ConversationStore) {
    let conversations = store.conversations();
    if conversations.is_empty() {
        println!("No conversations yet");
        return;
    }
    let selected = store.selected_id();
    for (i, conversation) in conversations.iter().enumerate() {
        let marker = if selected.as_deref() == Some(conversation.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}. {} ({}, {} messages)",
            marker,
            i + 1,
            conversation.title,
            conversation.model,
            conversation.messages.len()
        );
    }
}

fn print_history(store: &ConversationStore) {
    let Some(conversation) = store.current_conversation() else {
        println!("No conversation selected");
        return;
    };
    println!("{} ({})", conversation.title, conversation.model);
    for (i, message) in conversation.messages.iter().enumerate() {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        println!("{:>3}. {}: {}", i + 1, speaker, message.content);
    }
}

fn print_reply(result: Result<Option<Conversation>, StoreError>) {
    match result {
        Ok(Some(conversation)) => {
            if let Some(reply) = conversation.messages.last() {
                println!("{}", reply.content);
            }
        }
        Ok(None) => println!("The conversation no longer exists"),
        Err(e) => println!("{}", e),
    }
}
