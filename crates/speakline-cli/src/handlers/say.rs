//! Say command handler.
//!
//! Every text argument becomes one queued speech request. An input file, or
//! the whole of stdin when there are no arguments, is one request. The handler waits for the queue to
//! drain and reports each failed request. Ctrl-C clears the queue, stopping
//! the utterance in progress.

use std::path::Path;

use anyhow::Result;
use speakline_core::Settings;
use speakline_core::settings::validate_settings;
use speakline_queue::SpeechEnqueueResult;
use tokio::io::AsyncReadExt;

use crate::bootstrap::CliContext;
use crate::commands::SayArgs;
use crate::error::CliError;

/// Execute the say command.
pub async fn execute(ctx: &CliContext, args: SayArgs) -> Result<()> {
    let input = match &args.input_file {
        Some(path) => Some(read_input_file(path).await?),
        None if args.text.is_empty() => Some(read_stdin().await?),
        None => None,
    };
    let texts = collect_texts(&args.text, input)?;
    if args.output.is_some() && texts.len() > 1 {
        return Err(CliError::Arguments(
            "--output takes a single text; join the arguments or run once per file".to_string(),
        )
        .into());
    }

    let settings = apply_overrides(ctx.settings.clone(), &args)?;
    let queue = ctx.speech_queue(settings)?;
    let options = args.speech_options();

    let requests: Vec<SpeechEnqueueResult> = texts
        .into_iter()
        .map(|text| queue.enqueue_speech(text, options.clone()))
        .collect();
    tracing::debug!(requests = requests.len(), "Speech requests queued");

    let outcome = tokio::select! {
        result = queue.wait_for_all_tasks() => result,
        _ = tokio::signal::ctrl_c() => {
            let cleared = queue.clear().await;
            tracing::info!(
                removed = cleared.removed_count,
                aborted = cleared.aborted,
                "Speech interrupted"
            );
            return Err(CliError::Interrupted.into());
        }
    };

    for failure in &outcome.errors {
        eprintln!(
            "Error: speech request {} failed: {:#}",
            failure.task_id, failure.error
        );
    }
    if !outcome.is_success() {
        return Err(CliError::Speech {
            failed: outcome.errors.len(),
            total: requests.len(),
        }
        .into());
    }

    for request in &requests {
        if let Some(path) = &request.output_file {
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

async fn read_stdin() -> Result<String, CliError> {
    let mut text = String::new();
    tokio::io::stdin().read_to_string(&mut text).await?;
    Ok(text)
}

/// Read `path` as text; `-` reads stdin.
async fn read_input_file(path: &Path) -> Result<String, CliError> {
    if path == Path::new("-") {
        return read_stdin().await;
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}

/// Texts to speak: the input text as one request, else the non-blank arguments.
fn collect_texts(args: &[String], input: Option<String>) -> Result<Vec<String>, CliError> {
    let texts: Vec<String> = match input {
        Some(text) => vec![text],
        None => args.to_vec(),
    };
    let texts: Vec<String> = texts
        .into_iter()
        .filter(|text| !text.trim().is_empty())
        .collect();

    if texts.is_empty() {
        return Err(CliError::Arguments("no text to speak".to_string()));
    }
    Ok(texts)
}

/// Apply the invocation's generation and player flags to `settings`.
fn apply_overrides(mut settings: Settings, args: &SayArgs) -> Result<Settings, CliError> {
    let parallel = &mut settings.audio.parallel_generation;
    if let Some(max) = args.max_concurrency {
        parallel.max_concurrency = max;
    }
    if let Some(ahead) = args.buffer_ahead {
        parallel.buffer_ahead_count = ahead;
    }
    if let Some(player) = &args.player {
        settings.audio.player_command = player.split_whitespace().map(str::to_string).collect();
    }

    validate_settings(&settings).map_err(|e| CliError::Arguments(e.to_string()))?;
    Ok(settings)
}
