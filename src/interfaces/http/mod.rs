use actix_cors::Cors;
use actix_web::{dev::Server, get, http::StatusCode, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use validator::Validate;

use crate::application::use_cases::csv_converter::{CsvConverter, MappingMode};
use crate::domain::error::AppError;
use crate::domain::transform::TransformConfig;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::transform_store::TransformStore;
use crate::infrastructure::storage::OutputLayout;

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn TransformStore>,
    pub converter: CsvConverter,
    pub output: OutputLayout,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize)]
pub struct ConvertQuery {
    #[serde(default)]
    pub transform: Option<String>,
}

impl ConvertQuery {
    fn slug(&self) -> Option<&str> {
        self.transform
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedFile {
    pub row: usize,
    pub title: String,
    pub filename: String,
    pub size: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub run_id: String,
    pub output_dir: String,
    pub mode: MappingMode,
    pub headers: Vec<String>,
    pub files: Vec<ConvertedFile>,
    pub processing_time_ms: u64,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) | AppError::UnknownTransform(_) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_) | AppError::ParseError(_) | AppError::EmptyInput(_) => {
            StatusCode::BAD_REQUEST
        }
        AppError::Internal(_)
        | AppError::DatabaseError(_)
        | AppError::RenderError(_)
        | AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(logs: &Mutex<Vec<LogEntry>>, source: &str, err: &AppError) -> HttpResponse {
    let status = status_for(err);
    if status.is_server_error() {
        error!(source, error = %err, "Request failed");
        add_log(logs, "ERROR", source, &err.to_string());
    } else {
        warn!(source, error = %err, "Request rejected");
        add_log(logs, "WARN", source, &err.to_string());
    }
    HttpResponse::build(status).json(ErrorBody {
        error: err.kind(),
        message: err.to_string(),
    })
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/transforms")]
async fn list_transforms(data: web::Data<AppState>) -> impl Responder {
    match data.store.list_slugs().await {
        Ok(slugs) => HttpResponse::Ok().json(slugs),
        Err(e) => error_response(&data.logs, "Transforms", &e),
    }
}

#[get("/transforms/{slug}")]
async fn get_transform(data: web::Data<AppState>, slug: web::Path<String>) -> impl Responder {
    let slug = slug.into_inner();
    match data.store.get(&slug).await {
        Ok(Some(config)) => HttpResponse::Ok().json(config),
        Ok(None) => error_response(&data.logs, "Transforms", &AppError::UnknownTransform(slug)),
        Err(e) => error_response(&data.logs, "Transforms", &e),
    }
}

#[post("/transforms")]
async fn save_transform(
    data: web::Data<AppState>,
    req: web::Json<TransformConfig>,
) -> impl Responder {
    let config = req.into_inner().normalized();
    if let Err(e) = config.validate() {
        return error_response(&data.logs, "Transforms", &AppError::from(e));
    }

    match data.store.put(&config).await {
        Ok(()) => {
            add_log(
                &data.logs,
                "INFO",
                "Transforms",
                &format!(
                    "Saved transform '{}' (version={} columns={})",
                    config.slug,
                    config.version,
                    config.columns.len()
                ),
            );
            HttpResponse::Ok().json(config)
        }
        Err(e) => error_response(&data.logs, "Transforms", &e),
    }
}

#[post("/convert/preview")]
async fn preview_csv(
    data: web::Data<AppState>,
    query: web::Query<ConvertQuery>,
    body: web::Bytes,
) -> impl Responder {
    match data.converter.preview(&body, query.slug()).await {
        Ok(preview) => HttpResponse::Ok().json(preview),
        Err(e) => error_response(&data.logs, "Convert", &e),
    }
}

#[post("/convert")]
async fn convert_csv(
    data: web::Data<AppState>,
    query: web::Query<ConvertQuery>,
    body: web::Bytes,
) -> impl Responder {
    add_log(
        &data.logs,
        "INFO",
        "Convert",
        &format!(
            "Converting upload ({} bytes, transform={})",
            body.len(),
            query.slug().unwrap_or("-")
        ),
    );

    let conversion = match data.converter.convert(&body, query.slug()).await {
        Ok(conversion) => conversion,
        Err(e) => return error_response(&data.logs, "Convert", &e),
    };

    let (run_id, run_dir) = match data.output.write_run(&conversion.artifacts) {
        Ok(written) => written,
        Err(e) => return error_response(&data.logs, "Convert", &e),
    };

    add_log(
        &data.logs,
        "INFO",
        "Convert",
        &format!(
            "Wrote {} documents to {}",
            conversion.artifacts.len(),
            run_dir.display()
        ),
    );

    let files = conversion
        .artifacts
        .iter()
        .map(|artifact| ConvertedFile {
            row: artifact.index + 1,
            title: artifact.title.clone(),
            filename: artifact.filename.clone(),
            size: artifact.bytes.len(),
        })
        .collect();

    HttpResponse::Ok().json(ConvertResponse {
        run_id,
        output_dir: run_dir.display().to_string(),
        mode: conversion.mode,
        headers: conversion.headers,
        files,
        processing_time_ms: conversion.processing_time_ms,
    })
}

#[get("/logs")]
async fn get_logs(data: web::Data<AppState>) -> impl Responder {
    match data.logs.lock() {
        Ok(logs) => HttpResponse::Ok().json(&*logs),
        Err(_) => HttpResponse::InternalServerError().body("Log buffer unavailable"),
    }
}

/// Register the API under `/api`, sharing one state and the upload size limit.
pub fn configure(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        let payload_limit = state.config.max_upload_bytes;
        cfg.app_data(state)
            .app_data(web::PayloadConfig::new(payload_limit))
            .service(
                web::scope("/api")
                    .service(health)
                    .service(list_transforms)
                    .service(get_transform)
                    .service(save_transform)
                    .service(preview_csv)
                    .service(convert_csv)
                    .service(get_logs),
            );
    }
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> Option<LogEntry> {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().ok()?;
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    Some(entry)
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn start_server(state: AppState) -> std::io::Result<Server> {
    let address = state.config.bind_address();
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Upload page may be served from another origin

        App::new().wrap(cors).configure(configure(state.clone()))
    })
    .bind(address.clone())?
    .run();

    info!(host = %address.0, port = address.1, "HTTP server listening");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bootstrap::{build_state, seed_legacy_profile};
    use crate::infrastructure::db::transform_store::InMemoryTransformStore;
    use actix_web::test::{
        call_and_read_body_json, call_service, init_service, read_body_json, TestRequest,
    };
    use serde_json::Value;

    async fn test_state() -> web::Data<AppState> {
        let store = Arc::new(InMemoryTransformStore::new());
        seed_legacy_profile(store.as_ref()).await.unwrap();
        let config = AppConfig {
            output_dir: std::env::temp_dir()
                .join(format!("survey-pdf-http-{}", uuid::Uuid::new_v4())),
            ..AppConfig::default()
        };
        let logs = Arc::new(Mutex::new(Vec::new()));
        web::Data::new(build_state(config, store, logs).unwrap())
    }

    #[actix_web::test]
    async fn test_list_and_get_transforms() {
        let state = test_state().await;
        let app = init_service(App::new().configure(configure(state))).await;

        let req = TestRequest::get().uri("/api/transforms").to_request();
        let slugs: Vec<String> = call_and_read_body_json(&app, req).await;
        assert_eq!(slugs, vec!["moores"]);

        let req = TestRequest::get().uri("/api/transforms/moores").to_request();
        let config: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(config["titleColumn"], "Customer Name");

        let req = TestRequest::get().uri("/api/transforms/missing").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_save_transform_validates() {
        let state = test_state().await;
        let app = init_service(App::new().configure(configure(state))).await;

        let req = TestRequest::post()
            .uri("/api/transforms")
            .set_json(serde_json::json!({
                "slug": "spring",
                "title": "Spring Fair",
                "titleColumn": "",
                "columns": [{ "outputName": "Name", "sourceIndex": 1 }]
            }))
            .to_request();
        let saved: Value = call_and_read_body_json(&app, req).await;
        assert_eq!(saved["description"], "Upload a CSV for Spring Fair");
        assert!(saved.get("titleColumn").is_none());

        let req = TestRequest::post()
            .uri("/api/transforms")
            .set_json(serde_json::json!({
                "slug": "Not A Slug",
                "title": "Bad",
                "columns": [{ "outputName": "Name", "sourceIndex": 0 }]
            }))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_preview_with_unknown_transform_is_not_found() {
        let state = test_state().await;
        let app = init_service(App::new().configure(configure(state))).await;

        let req = TestRequest::post()
            .uri("/api/convert/preview?transform=nope")
            .set_payload("a,b\n1,2\n")
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = read_body_json(resp).await;
        assert_eq!(body["error"], "unknown_transform");
    }

    #[actix_web::test]
    async fn test_convert_empty_input_is_bad_request() {
        let state = test_state().await;
        let app = init_service(App::new().configure(configure(state))).await;

        let req = TestRequest::post()
            .uri("/api/convert")
            .set_payload("Customer Name,Email\n")
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = read_body_json(resp).await;
        assert_eq!(body["error"], "empty_input");
    }

    #[actix_web::test]
    async fn test_convert_writes_documents() {
        let state = test_state().await;
        let output_root = state.output.root().to_path_buf();
        let app = init_service(App::new().configure(configure(state.clone()))).await;

        let req = TestRequest::post()
            .uri("/api/convert")
            .set_payload("Customer Name,Email\nAlice,a@x.io\nBob,b@x.io\n")
            .to_request();
        let body: Value = call_and_read_body_json(&app, req).await;

        assert_eq!(body["mode"], "pass_through");
        assert_eq!(body["files"].as_array().unwrap().len(), 2);
        assert_eq!(body["files"][1]["filename"], "Bob.pdf");

        let run_dir = std::path::PathBuf::from(body["outputDir"].as_str().unwrap());
        assert!(run_dir.join("Alice.pdf").exists());
        assert!(run_dir.join("Bob.pdf").exists());

        let logs = state.logs.lock().unwrap();
        assert!(logs.iter().any(|entry| entry.message.starts_with("Wrote 2 documents")));
        drop(logs);

        std::fs::remove_dir_all(output_root).unwrap();
    }

    #[test]
    fn test_log_buffer_is_bounded() {
        let logs = Mutex::new(Vec::new());
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            add_log(&logs, "INFO", "Test", &format!("entry {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(logs[0].message, "entry 5");
    }
}
