use anyhow::{Context, Result};
use clap::Parser;
use interview_core::Input;
use interview_core::auth::AuthContext;
use interview_core::capture::MediaBackend;
use interview_core::controller::{self, InterviewController, Platform};
use interview_core::gateway::GatewayClient;
use interview_native_utils::VirtualMicrophone;
use interview_practice::cli::Cli;
use interview_practice::config::Config;
use interview_practice::console::{
    ConsoleLine, ConsoleRenderer, ConsoleSynthesizer, HELP, TypedRecognitionService, parse_line,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    if args.list_devices {
        return list_devices();
    }

    // --- 2. Load Configuration ---
    let config = match args.env_file.as_deref() {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    }
    .context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting practice session...");

    // --- 4. Initialize API Client ---
    let auth = Arc::new(AuthContext::with_token(config.token.expose_secret()));
    let api = Arc::new(
        GatewayClient::new(&config.api_base_url, auth.clone(), config.http_timeout)
            .context("Failed to create the API gateway client")?,
    );
    tracing::info!("Using API gateway at {}", api.base_url());

    // --- 5. Platform Setup ---
    let recognition = Arc::new(TypedRecognitionService::new());
    let platform = Platform {
        media: media_backend(&args)?,
        recognition: recognition.clone(),
        synthesis: Arc::new(ConsoleSynthesizer::new()),
    };

    // Create the channels that decouple the controller from the terminal.
    let (input_tx, input_rx) = mpsc::channel::<Input>(32);
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();

    let interview = InterviewController::new(api, auth, platform, args.settings(), command_tx);

    // --- 6. Spawn Terminal Tasks ---

    // Reading stdin blocks, so it gets a dedicated thread rather than a runtime task.
    let stdin_inputs = input_tx.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_line(&line) {
                ConsoleLine::Input(input) => {
                    if stdin_inputs.blocking_send(input).is_err() {
                        return;
                    }
                }
                ConsoleLine::Speech(text) => {
                    if !recognition.dictate(&text) {
                        println!("Not recording right now. Type /answer to start answering.");
                    }
                }
                ConsoleLine::Help => println!("{HELP}"),
                ConsoleLine::Unknown(command) => {
                    println!("Unknown command {command}. Type /help for the list.");
                }
                ConsoleLine::Empty => {}
            }
        }
        // End of input.
        let _ = stdin_inputs.blocking_send(Input::Shutdown);
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            let _ = input_tx.send(Input::Shutdown).await;
        }
    });

    let printer = tokio::spawn(async move {
        let mut renderer = ConsoleRenderer::new();
        while let Some(command) = command_rx.recv().await {
            if let Some(text) = renderer.render(&command) {
                println!("{text}");
            }
        }
    });

    // --- 7. Run the Interview ---
    println!("{HELP}\n\nType /start to begin.");
    let state = controller::run(interview, input_rx).await;
    // The controller owned the command sender, so the printer drains and exits.
    printer.await.context("Command printer panicked")?;

    tracing::info!("Practice session finished ({state})");
    Ok(())
}

fn media_backend(args: &Cli) -> Result<Arc<dyn MediaBackend>> {
    if args.microphone {
        #[cfg(feature = "microphone")]
        {
            return Ok(Arc::new(interview_native_utils::MicrophoneBackend::new(
                args.device.clone(),
            )));
        }
        #[cfg(not(feature = "microphone"))]
        anyhow::bail!("--microphone needs a build with the `microphone` feature");
    }
    if args.device.is_some() {
        tracing::warn!("--device is ignored without --microphone");
    }
    Ok(Arc::new(VirtualMicrophone::new()))
}

#[cfg(feature = "microphone")]
fn list_devices() -> Result<()> {
    let devices = interview_native_utils::device::get_available_inputs()
        .context("Failed to list input devices")?;
    println!("Input devices:\n{devices}");
    Ok(())
}

#[cfg(not(feature = "microphone"))]
fn list_devices() -> Result<()> {
    anyhow::bail!("--list-devices needs a build with the `microphone` feature")
}
