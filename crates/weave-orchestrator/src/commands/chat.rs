use std::io::Write as _;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use weave_config::WeaveConfig;
use weave_core::{ChatMessage, Result};
use weave_llm::LlmClient;
use weave_wire::GenerationParams;

use crate::image_out;
use crate::worker_client::WorkerClient;

pub(super) async fn cmd_chat(config: WeaveConfig, socket_path: PathBuf) -> Result<()> {
    println!("🪡 Weave Interactive Chat");
    println!("   Type 'exit' or Ctrl+C to quit");
    println!("   Ask for an image and the model decides when to generate one");
    println!();

    let client = LlmClient::new(config.llm.base_url.clone(), config.llm.model.clone());
    info!(base_url = %config.llm.base_url, model = %config.llm.model, "local_provider: checking health");
    if let Err(e) = client.check_model_loaded().await {
        eprintln!("⚠️  {e}");
        eprintln!("   Continuing anyway — the first chat turn will surface the same error.");
    }

    let worker = WorkerClient::new(
        socket_path,
        config.worker.recv_timeout_secs,
        config.worker.send_timeout_secs,
    );
    let mut conversation: Vec<ChatMessage> = Vec::new();
    let mut request_id: u64 = 1;

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = reader.lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" || trimmed == "/exit" {
            println!("👋 Goodbye!");
            break;
        }

        conversation.push(ChatMessage::user(trimmed));

        let cancel = CancellationToken::new();
        let mut got_text = false;
        let on_token = |t: &str| -> Result<()> {
            if !got_text {
                eprint!("\x1b[32mweave>\x1b[0m ");
                got_text = true;
            }
            print!("{t}");
            std::io::stdout().flush().ok();
            Ok(())
        };

        info!("local_provider: streaming chat");
        let turn = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                println!("\n⚠️  generation canceled");
                continue;
            }
            result = client.chat(&conversation, None, &cancel, on_token) => result,
        };

        match turn {
            Ok(update) => {
                println!();
                conversation.push(ChatMessage::assistant(update.prompt.clone()));

                if !update.generate_image {
                    continue;
                }

                let mut params = GenerationParams {
                    width: config.generation.default_width,
                    height: config.generation.default_height,
                    steps: update.steps.clamp(0, u32::MAX as i64) as u32,
                    cfg_scale: update.cfg as f32,
                    seed: resolve_seed(update.seed),
                };
                let adjusted = params.sanitize();
                if !adjusted.is_empty() {
                    eprintln!("💡 adjusted out-of-range field(s): {}", adjusted.join(", "));
                }

                let prompt_bytes = update.prompt.as_bytes();
                match worker
                    .generate(request_id, params, prompt_bytes, prompt_bytes, prompt_bytes)
                    .await
                {
                    Ok(response) => {
                        let out_path = PathBuf::from(format!("weave-output-{request_id}.ppm"));
                        match image_out::write_ppm(&response, &out_path) {
                            Ok(()) => println!("📸 saved {}", out_path.display()),
                            Err(e) => eprintln!("❌ failed to save image: {e}"),
                        }
                        request_id += 1;
                    }
                    Err(e) => eprintln!("❌ worker request failed: {e}"),
                }
            }
            Err(e) => {
                println!();
                eprintln!("❌ {}", e.error);
                if !e.partial.is_empty() {
                    eprintln!("   (partial response before the error: {:?})", e.partial);
                }
            }
        }
        println!();
    }

    Ok(())
}

/// Turns the tool call's `-1` sentinel ("no preference") into a concrete
/// seed. Not cryptographically random — just distinct enough across turns
/// that the worker's deterministic synthetic pattern actually varies.
fn resolve_seed(requested: i64) -> i64 {
    if requested != -1 {
        return requested;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    nanos ^ (std::process::id() as i64)
}
