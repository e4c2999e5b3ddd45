use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{unbounded, Sender};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use speech_transcriber::config::Config;
use speech_transcriber::console::{self, Command, HELP};
use speech_transcriber::controller::Controller;
use speech_transcriber::delivery::{self, DeliveryLoop};
use speech_transcriber::events::AppEvent;
use speech_transcriber::output::OutputHandler;
use speech_transcriber::runner::JobRunner;
use speech_transcriber::transport::HttpTransport;

const CHECK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(
    name = "speech-transcriber",
    version,
    about = "Transcribe audio files with the SiliconFlow speech API"
)]
struct Cli {
    /// Config file to use instead of ~/.siliconflow-transcriber/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Transcribe one file and print the result
    Transcribe(TranscribeArgs),
    /// Interactive session (default)
    Shell,
    /// Print the saved settings
    Config,
}

#[derive(Args)]
struct TranscribeArgs {
    /// Audio file; defaults to the last one used
    file: Option<PathBuf>,

    /// Bearer token
    #[arg(long, env = "SILICONFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Also write the result text to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also copy the result text to the clipboard
    #[arg(long)]
    copy: bool,

    /// Remember token, model and file for next time
    #[arg(long)]
    save: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)?;
    log::info!("Config loaded: {:?}", config);

    match cli.command.unwrap_or(CliCommand::Shell) {
        CliCommand::Transcribe(args) => run_transcribe(config, &config_path, args),
        CliCommand::Shell => run_shell(config, &config_path),
        CliCommand::Config => {
            print_config(&config, &config_path);
            Ok(())
        }
    }
}

/// The thread that calls this owns the delivery loop and must be the one pumping it.
fn build_controller(config: &Config) -> Result<(Controller, DeliveryLoop)> {
    let transport = HttpTransport::new(config.timeout())?;
    let (ctx, delivery) = delivery::channel();
    let runner = JobRunner::new(Arc::new(transport), &config.endpoint, ctx);
    Ok((Controller::new(Arc::new(runner)), delivery))
}

fn install_interrupt_handler(tx: Sender<AppEvent>) -> Result<()> {
    ctrlc::set_handler(move || {
        let _ = tx.send(AppEvent::Interrupt);
    })?;
    Ok(())
}

fn run_transcribe(mut config: Config, config_path: &Path, args: TranscribeArgs) -> Result<()> {
    if let Some(token) = args.token {
        config.token = token;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(file) = args.file {
        config.file_path = file.to_string_lossy().into_owned();
    }
    let params = config.job_parameters();

    let (event_tx, event_rx) = unbounded::<AppEvent>();
    install_interrupt_handler(event_tx)?;
    let (controller, delivery) = build_controller(&config)?;
    let mut output = OutputHandler::new();

    controller.submit(params.clone())?;
    if args.save {
        config.remember(&params);
        config.save_to(config_path)?;
    }
    log::info!("Transcribing {} with {}", params.file_path, params.model);

    while controller.is_running() {
        while let Ok(event) = event_rx.try_recv() {
            if event == AppEvent::Interrupt {
                if controller.display().cancel_requested {
                    return Err(anyhow!("Interrupted while waiting for the cancelled request"));
                }
                controller.cancel();
                eprintln!("{}", controller.display().status_text);
            }
        }
        delivery.pump_timeout(CHECK_INTERVAL);
    }

    let display = controller.display();
    eprintln!("{}", display.status_text);
    println!("{}", display.result_text);

    if let Some(path) = args.output {
        output.export_to_file(&path, &display.result_text)?;
        eprintln!("Result exported to {}", path.display());
    }
    if args.copy {
        output.copy_to_clipboard(&display.result_text)?;
        eprintln!("Result copied to clipboard");
    }
    Ok(())
}

fn run_shell(mut config: Config, config_path: &Path) -> Result<()> {
    let (event_tx, event_rx) = unbounded::<AppEvent>();
    install_interrupt_handler(event_tx.clone())?;
    console::listen(event_tx);

    let (controller, delivery) = build_controller(&config)?;
    let mut output = OutputHandler::new();
    let mut closing = false;

    println!("{}", HELP);
    print_inputs(&config);

    loop {
        while let Ok(event) = event_rx.try_recv() {
            match event {
                AppEvent::Command(command) => {
                    if !handle_command(command, &mut config, config_path, &controller, &mut output) {
                        return Ok(());
                    }
                }
                AppEvent::Interrupt => {
                    if controller.display().can_cancel() {
                        controller.cancel();
                        println!("{}", controller.display().status_text);
                    } else {
                        return Ok(());
                    }
                }
                AppEvent::InputClosed => closing = true,
            }
        }

        let was_running = controller.is_running();
        delivery.pump_timeout(CHECK_INTERVAL);

        if was_running && !controller.is_running() {
            let display = controller.display();
            println!("{}", display.status_text);
            println!("{}", display.result_text);
        }
        if closing && !controller.is_running() {
            return Ok(());
        }
    }
}

/// Returns false when the session should end.
fn handle_command(
    command: Command,
    config: &mut Config,
    config_path: &Path,
    controller: &Controller,
    output: &mut OutputHandler,
) -> bool {
    match command {
        Command::SetToken(token) => {
            config.token = token;
            println!("Token set ({})", config.masked_token());
        }
        Command::SetModel(model) => {
            config.model = model;
            println!("Model: {}", config.model);
        }
        Command::SetFile(file) => {
            if !file.is_empty() && !Path::new(&file).exists() {
                println!("Warning: {} does not exist", file);
            }
            config.file_path = file;
            println!("File: {}", config.file_path);
        }
        Command::Submit => {
            if !controller.display().can_submit() {
                println!("A request is already running");
            } else {
                match controller.submit(config.job_parameters()) {
                    Ok(()) => println!("{}", controller.display().status_text),
                    Err(e) => println!("{}", e),
                }
            }
        }
        Command::Cancel => {
            if controller.display().can_cancel() {
                controller.cancel();
                println!("{}", controller.display().status_text);
            } else {
                println!("Nothing to cancel");
            }
        }
        Command::Status => {
            println!("{}", controller.display().status_text);
            print_inputs(config);
        }
        Command::Show => {
            let display = controller.display();
            if display.result_text.is_empty() {
                println!("(no result)");
            } else {
                println!("{}", display.result_text);
            }
        }
        Command::Edit(text) => controller.set_result_text(text),
        Command::Clear => controller.clear_results(),
        Command::Copy => match output.copy_to_clipboard(&controller.display().result_text) {
            Ok(()) => println!("Result copied to clipboard"),
            Err(e) => println!("{:#}", e),
        },
        Command::Export(path) => {
            match output.export_to_file(&path, &controller.display().result_text) {
                Ok(()) => println!("Result exported to {}", path.display()),
                Err(e) => println!("{:#}", e),
            }
        }
        Command::Save => save_config(config, config_path),
        Command::Help => println!("{}", HELP),
        Command::Quit => {
            if controller.is_running() {
                controller.cancel();
            }
            save_config(config, config_path);
            return false;
        }
        Command::Empty => {}
        Command::Unknown(line) => println!("Unknown command: {} (type 'help')", line),
    }
    true
}

fn save_config(config: &Config, config_path: &Path) {
    match config.save_to(config_path) {
        Ok(()) => println!("Settings saved to {}", config_path.display()),
        Err(e) => {
            log::error!("Failed to save settings: {}", e);
            println!("Failed to save settings: {:#}", e);
        }
    }
}

fn print_inputs(config: &Config) {
    println!("  token: {}", display_or_unset(&config.masked_token()));
    println!("  model: {}", display_or_unset(&config.model));
    println!("  file:  {}", display_or_unset(&config.file_path));
}

fn print_config(config: &Config, config_path: &Path) {
    println!("config:   {}", config_path.display());
    print_inputs(config);
    println!("  endpoint: {}", config.endpoint);
    println!("  timeout:  {}s", config.timeout_secs);
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
