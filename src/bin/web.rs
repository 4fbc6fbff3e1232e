//! HTTP front-end: a single form page plus a generate endpoint.
//!
//! Usage: `kokoro-web [MODEL_DIR] [CONFIG_JSON]`

use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Form, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use kokoro_studio::config::GenerationConfig;
use kokoro_studio::engine::SpeechEngine;
use kokoro_studio::engines::kokoro::{KokoroEngine, KokoroModel};
use kokoro_studio::error::GenerationError;
use kokoro_studio::router::EngineRegistry;
use kokoro_studio::session::{GenerationRequest, Session};
use kokoro_studio::voices::VoiceCatalog;

const DEFAULT_MODEL_DIR: &str = "models/kokoro";
const BIND_ADDR: &str = "0.0.0.0:7860";

#[derive(Debug, Deserialize)]
struct GenerateForm {
    voice: String,
    text: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "wav".to_string()
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("kokoro-web failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let model_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
    let config = match args.next() {
        Some(path) => GenerationConfig::from_json_file(&PathBuf::from(path))?,
        None => GenerationConfig::default(),
    };

    log::info!("loading model from {}", model_dir.display());
    let model = Arc::new(Mutex::new(KokoroModel::load(&model_dir, None)?));
    let catalog = {
        let model = model.lock().unwrap_or_else(PoisonError::into_inner);
        VoiceCatalog::from_names(model.list_voices().into_iter().map(String::from))
    };

    let registry = EngineRegistry::new(move |_key| {
        Ok(Box::new(KokoroEngine::with_model(Arc::clone(&model))) as Box<dyn SpeechEngine>)
    });
    let session = Arc::new(Session::new(registry, catalog, config));

    let app = Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .with_state(session);

    let listener = tokio::net::TcpListener::bind(BIND_ADDR).await?;
    log::info!("listening on http://{BIND_ADDR}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(State(session): State<Arc<Session>>) -> Html<String> {
    let options: String = session
        .voices()
        .iter()
        .map(|voice| format!("<option value=\"{voice}\">{voice}</option>\n"))
        .collect();

    Html(format!(
        "<!doctype html>\n\
         <html>\n<head><title>Kokoro TTS Generator</title></head>\n<body>\n\
         <h1>Kokoro TTS Generator</h1>\n\
         <form action=\"/generate\" method=\"post\">\n\
         <p><label>Voice<br><select name=\"voice\">\n{options}</select></label></p>\n\
         <p><label>Text<br>\
         <textarea name=\"text\" rows=\"3\" cols=\"60\" \
         placeholder=\"Enter text to convert to speech...\"></textarea></label></p>\n\
         <p>Output format:\n\
         <label><input type=\"radio\" name=\"format\" value=\"wav\" checked> wav</label>\n\
         <label><input type=\"radio\" name=\"format\" value=\"mp3\"> mp3</label>\n\
         <label><input type=\"radio\" name=\"format\" value=\"aac\"> aac</label></p>\n\
         <p><button type=\"submit\">Generate Speech</button></p>\n\
         </form>\n</body>\n</html>\n"
    ))
}

async fn generate(
    State(session): State<Arc<Session>>,
    Form(form): Form<GenerateForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = GenerationRequest {
        voice: form.voice,
        text: form.text,
        speed: 1.0,
        format: form.format,
    };

    let session = Arc::clone(&session);
    let joined = tokio::task::spawn_blocking(move || {
        let report = session
            .generate(&request)
            .map_err(|e| (status_for(&e), e.to_string()))?;
        let bytes = std::fs::read(&report.output_path).map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not read generated audio: {e}"),
            )
        })?;
        Ok::<_, (StatusCode, String)>((report, bytes))
    })
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("generation task failed: {e}"),
        )
    })?;
    let (report, bytes) = joined?;

    let content_type = match report.output_path.extension().and_then(|e| e.to_str()) {
        Some("mp3") => "audio/mpeg",
        Some("aac") => "audio/aac",
        _ => "audio/wav",
    };
    let filename = report
        .output_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.wav")
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

fn status_for(err: &GenerationError) -> StatusCode {
    match err {
        GenerationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GenerationError::EmptyResult => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
