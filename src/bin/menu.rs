//! Interactive menu front-end: list voices, generate speech, exit.
//!
//! Usage: `kokoro-menu [MODEL_DIR] [CONFIG_JSON]`

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use kokoro_studio::config::GenerationConfig;
use kokoro_studio::engine::SpeechEngine;
use kokoro_studio::engines::kokoro::{KokoroEngine, KokoroModel};
use kokoro_studio::router::EngineRegistry;
use kokoro_studio::session::{GenerationRequest, Session};
use kokoro_studio::stream::StopReason;
use kokoro_studio::voices::VoiceCatalog;

const DEFAULT_MODEL_DIR: &str = "models/kokoro";
const DEFAULT_VOICE: &str = "af_bella";
const DEFAULT_TEXT: &str = "Hello, welcome to this text-to-speech test.";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("kokoro-menu failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let model_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
    let config = match args.next() {
        Some(path) => GenerationConfig::from_json_file(&PathBuf::from(path))?,
        None => GenerationConfig::default(),
    };

    println!("Initializing model...");
    let load_start = Instant::now();
    let model = Arc::new(Mutex::new(KokoroModel::load(&model_dir, None)?));
    println!("Model loaded in {:.2?}", load_start.elapsed());

    let catalog = {
        let model = model.lock().unwrap_or_else(PoisonError::into_inner);
        VoiceCatalog::from_names(model.list_voices().into_iter().map(String::from))
    };

    // One pre-loaded model backs every language key's engine.
    let registry = EngineRegistry::new(move |_key| {
        Ok(Box::new(KokoroEngine::with_model(Arc::clone(&model))) as Box<dyn SpeechEngine>)
    });
    let session = Session::new(registry, catalog, config);

    loop {
        println!("\n=== Kokoro TTS Menu ===");
        println!("1. List available voices");
        println!("2. Generate speech");
        println!("3. Exit");
        match prompt("Select an option (1-3): ")?.as_str() {
            "1" => {
                println!("\nAvailable voices:");
                for voice in session.voices() {
                    println!("- {voice}");
                }
            }
            "2" => generate_interactive(&session)?,
            "3" => {
                println!("\nGoodbye!");
                break;
            }
            _ => println!("\nInvalid choice. Please try again."),
        }
    }
    Ok(())
}

fn generate_interactive(session: &Session) -> Result<(), Box<dyn Error>> {
    let voices = session.voices();
    if voices.is_empty() {
        println!("No voices found! Please check the model directory.");
        return Ok(());
    }

    let voice = select_voice(voices)?;
    let text = {
        let input = prompt("\nEnter the text to convert to speech (blank for the default): ")?;
        if input.is_empty() {
            DEFAULT_TEXT.to_string()
        } else {
            input
        }
    };
    let speed = select_speed()?;

    println!("\nGenerating speech for: '{text}'");
    println!("Using voice: {voice}");
    println!("Speed: {speed}x");

    let request = GenerationRequest {
        voice,
        text,
        speed,
        format: "wav".to_string(),
    };
    match session.generate(&request) {
        Ok(report) => {
            println!(
                "\nGenerated {} segment(s), {:.2}s of audio",
                report.segments_with_audio, report.duration_secs
            );
            match report.stop {
                StopReason::Exhausted => {}
                StopReason::TotalBudget => {
                    println!("Warning: total generation time exceeded the limit, output is partial.")
                }
                StopReason::SegmentBudget => {
                    println!("Warning: a segment took too long, output is partial.")
                }
                StopReason::StreamError => {
                    println!("Warning: the engine failed mid-stream, output is partial.")
                }
            }
            println!("Audio saved to {}", report.output_path.display());
        }
        Err(e) => println!("\nGeneration failed: {e}"),
    }
    Ok(())
}

fn select_voice(voices: &[String]) -> io::Result<String> {
    println!("\nAvailable voices:");
    for (i, voice) in voices.iter().enumerate() {
        println!("{}. {voice}", i + 1);
    }

    loop {
        let input = prompt(&format!(
            "\nSelect a voice number (blank for '{DEFAULT_VOICE}'): "
        ))?;
        if input.is_empty() {
            if voices.iter().any(|v| v == DEFAULT_VOICE) {
                return Ok(DEFAULT_VOICE.to_string());
            }
            return Ok(voices[0].clone());
        }
        match input.parse::<usize>() {
            Ok(choice) if (1..=voices.len()).contains(&choice) => {
                return Ok(voices[choice - 1].clone())
            }
            Ok(_) => println!("Invalid choice. Please try again."),
            Err(_) => println!("Please enter a valid number."),
        }
    }
}

fn select_speed() -> io::Result<f32> {
    loop {
        let input = prompt("\nEnter speech speed (0.5-2.0, blank for 1.0): ")?;
        if input.is_empty() {
            return Ok(1.0);
        }
        match input.parse::<f32>() {
            Ok(speed) if (0.5..=2.0).contains(&speed) => return Ok(speed),
            Ok(_) => println!("Speed must be between 0.5 and 2.0."),
            Err(_) => println!("Please enter a valid number."),
        }
    }
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
