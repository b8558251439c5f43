use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use video_ideas::api::GeminiClient;
use video_ideas::config::{Config, DEFAULT_CONFIG_PATH};
use video_ideas::credential::{CredentialStore, StoredCredential};
use video_ideas::init;
use video_ideas::platform;
use video_ideas::session::MediaSession;
use video_ideas::storage::LocalStorage;
use video_ideas::studio::{Studio, Submission};
use video_ideas::workflow::{CancelFlag, FailureKind, Phase};

const USAGE: &str = "usage: video-ideas-cli [--config <path>] [--set-key <key>] [--clear-key] [--prompt <text> [--voiceover <text>] [--open]]";

#[derive(Debug, Default)]
struct CliArgs {
    config: Option<PathBuf>,
    prompt: Option<String>,
    voiceover: String,
    set_key: Option<String>,
    clear_key: bool,
    open: bool,
}

impl CliArgs {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self> {
        let mut out = CliArgs::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => out.config = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--prompt" => out.prompt = Some(value(&mut args, &arg)?),
                "--voiceover" => out.voiceover = value(&mut args, &arg)?,
                "--set-key" => out.set_key = Some(value(&mut args, &arg)?),
                "--clear-key" => out.clear_key = true,
                "--open" => out.open = true,
                other => anyhow::bail!("unknown argument: {}\n{}", other, USAGE),
            }
        }
        Ok(out)
    }
}

fn value<I: Iterator<Item = String>>(args: &mut I, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
}

/// What a Ctrl-C means right now: cancel the running attempt, or leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    Exit,
}

fn on_interrupt(running: &AtomicBool, cancel: &CancelFlag) -> Interrupt {
    if running.load(Ordering::SeqCst) {
        cancel.cancel();
        Interrupt::Cancel
    } else {
        Interrupt::Exit
    }
}

async fn read_line(prompt: &str) -> Result<Option<String>> {
    eprint!("{}", prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let cfg_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let cfg = Config::load(&cfg_path).await?;
    init::ensure_directories(&cfg).await?;

    let mut store =
        StoredCredential::new(LocalStorage::open(&cfg.storage_path)).with_dev_fallback();
    if args.clear_key {
        store.clear();
        println!("Cleared saved key.");
    }
    if let Some(key) = args.set_key.as_deref() {
        store.set(key);
        println!("Saved key.");
    }

    let Some(prompt) = args.prompt.clone() else {
        if args.clear_key || args.set_key.is_some() {
            return Ok(());
        }
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let api = GeminiClient::new(&cfg)?;
    let mut studio = Studio::new(store, cfg.settings(), MediaSession::new()?);
    studio.prompt = prompt;
    studio.voiceover = args.voiceover.clone();

    let running = Arc::new(AtomicBool::new(false));
    let cancel = studio.cancel_flag();
    let signal_running = Arc::clone(&running);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&signal_running, &cancel) {
                Interrupt::Cancel => eprintln!("Cancelling..."),
                Interrupt::Exit => std::process::exit(130),
            }
        }
    });

    let mut submission = studio.submit();
    let mut asked_for_key = false;
    loop {
        match submission {
            Submission::Ready(plan) => {
                running.store(true, Ordering::SeqCst);
                studio.run(&api, plan).await;
                running.store(false, Ordering::SeqCst);
                break;
            }
            Submission::NeedsKey if asked_for_key => {
                studio.cancel_key_entry();
                eprintln!("The key could not be saved to {}.", cfg.storage_path);
                std::process::exit(1);
            }
            Submission::NeedsKey => {
                asked_for_key = true;
                eprintln!("{}", video_ideas::editor::DEFAULT_DESCRIPTION);
                let entered = read_line("Gemini API key: ").await?.unwrap_or_default();
                if entered.trim().is_empty() {
                    studio.cancel_key_entry();
                    eprintln!("No key entered.");
                    std::process::exit(1);
                }
                studio.editor_mut().set_value(&entered);
                submission = studio.save_key();
            }
            Submission::Ignored => {
                eprintln!("Nothing to do: the prompt is empty.");
                std::process::exit(2);
            }
        }
    }

    match studio.phase() {
        Phase::Done => match studio.videos().first() {
            Some(video) => {
                println!("id:        {}", video.id);
                println!("video:     {}", video.url.display());
                println!("prompt:    {}", video.prompt);
                println!("created:   {}", video.timestamp.to_rfc3339());
                println!("voiceover: {} bytes (base64)", video.audio_blob.len());
                if args.open && platform::open_path(&video.url) {
                    read_line("Press Enter to end the session (the video is discarded)... ")
                        .await?;
                }
            }
            None => {
                println!("{}", studio.notice().unwrap_or("Finished with nothing to show."));
            }
        },
        Phase::Failed(FailureKind::Cancelled) => {
            eprintln!("Cancelled.");
            std::process::exit(1);
        }
        _ => {
            if let Some(message) = studio.system_error() {
                eprintln!("{}", message);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
