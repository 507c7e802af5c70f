//! FRPG game master REPL.
//!
//! Starts a new game or resumes a saved one, then reads player actions
//! from stdin and prints the game master's narration.
//!
//! ```bash
//! cargo run -p frpg-cli -- --theme cyberpunk
//! cargo run -p frpg-cli -- --load game.json
//! ```
//!
//! In-game commands: `/save <path>`, `/quit`.

use frpg_core::{GameSession, GroqProvider, SessionConfig};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    if std::env::var("GROQ_API_KEY").is_err() {
        eprintln!("Error: GROQ_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export GROQ_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let args: Vec<String> = std::env::args().collect();
    let theme = flag_value(&args, "--theme").unwrap_or_else(|| "cyberpunk".to_string());
    let load_path = flag_value(&args, "--load");
    let model = flag_value(&args, "--model");

    let mut config = SessionConfig::new();
    if let Some(model) = model {
        config = config.with_model(model);
    }

    let mut session = match load_path {
        Some(path) => {
            println!("Resuming game from {path}...");
            let provider = GroqProvider::from_env()?.with_config(config.provider_config());
            GameSession::load(&path, Arc::new(provider), config).await?
        }
        None => {
            let mut session = GameSession::from_env(config)?;
            println!("Creating a {theme} world. This takes a minute...");
            let reports = session.create_world(&theme).await?;

            println!("\n{}\n", reports[4].artifact);
            let name = prompt_line("Name your character: ")?;
            let details = prompt_line("Describe your character: ")?;

            // A fresh player starts with a small stake.
            session.add_player_character(&name, &details, 100)?;
            session.begin(&name)?;
            log::info!("player character {name} registered");
            session
        }
    };

    println!("\nPlay begins. Type /save <path> to save, /quit to exit.\n");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input == "/quit" {
            break;
        }
        if let Some(path) = input.strip_prefix("/save ") {
            match session.save(path.trim()).await {
                Ok(()) => println!("Saved to {}", path.trim()),
                Err(e) => eprintln!("Save failed: {e}"),
            }
            continue;
        }

        match session.player_action(input).await {
            Ok(report) => println!("\n{}\n", report.narrative),
            Err(e) => eprintln!("Turn failed: {e}"),
        }
    }

    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
