use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clipflow::config::{redact_url, Config};
use clipflow::db::tasks::{ClipRecord, TaskRecord};
use clipflow::db::DatabaseManager;
use clipflow::models::{
    DbHealthResponse, ErrorResponse, HealthResponse, JobStatus, RedisHealthResponse, ServiceInfo,
    TaskCreatedResponse, TaskResultResponse, TaskStatusResponse,
};
use clipflow::routes;
use clipflow::routes::tasks::CreateTaskRequest;
use clipflow::services::queue::{BrokerPool, JobQueue};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clipflow API",
        version = "1.0.0",
        description = "API per la generazione asincrona di clip da video sorgente",
        license(name = "MIT"),
    ),
    paths(
        clipflow::routes::health::service_info,
        clipflow::routes::health::health_check,
        clipflow::routes::health::health_db,
        clipflow::routes::health::health_redis,
        clipflow::routes::tasks::create_task,
        clipflow::routes::tasks::list_tasks,
        clipflow::routes::tasks::get_task_status,
        clipflow::routes::tasks::get_task_result,
        clipflow::routes::tasks::list_task_clips,
    ),
    components(schemas(
        ServiceInfo,
        HealthResponse,
        DbHealthResponse,
        RedisHealthResponse,
        JobStatus,
        TaskRecord,
        ClipRecord,
        CreateTaskRequest,
        TaskCreatedResponse,
        TaskStatusResponse,
        TaskResultResponse,
        ErrorResponse,
    )),
    tags(
        (name = "Sistema", description = "Health check e info"),
        (name = "Tasks", description = "Creazione e interrogazione task"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Carica variabili da .env
    dotenvy::dotenv().ok();

    // Inizializza logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Carica configurazione
    let config = Config::from_env();

    tracing::info!("Avvio Clipflow API...");
    tracing::info!("Database: {}", redact_url(&config.database_url));
    tracing::info!("Broker: {}", config.redacted_redis_url());
    tracing::info!("Coda job: {}", config.queue_name);

    let db = Arc::new(DatabaseManager::new(&config));
    let broker = Arc::new(BrokerPool::new(&config));
    let queue = Arc::new(JobQueue::new(broker.clone(), config.queue_name.clone()));

    // Avvio tollerante: i due backend si inizializzano in modo indipendente
    // e un fallimento diventa modalità degradata, mai un'uscita dal processo
    let db_ready = match db.get().await {
        Ok(_) => {
            tracing::info!("Database inizializzato");
            true
        }
        Err(e) => {
            tracing::error!("Inizializzazione database fallita: {}", e);
            false
        }
    };

    let queue_ready = match broker.get().await {
        Ok(_) => {
            tracing::info!("Coda job inizializzata");
            true
        }
        Err(e) => {
            tracing::error!("Inizializzazione coda job fallita: {}", e);
            false
        }
    };

    if db_ready && queue_ready {
        tracing::info!("Tutti i servizi inizializzati");
    } else {
        tracing::warn!(
            "Avvio in modalità degradata: le connessioni mancanti verranno ritentate al primo uso"
        );
    }

    // Directory di lavoro per i file scambiati con i worker
    std::fs::create_dir_all(&config.temp_dir).ok();
    std::fs::create_dir_all(&config.output_dir).ok();

    // CORS aperto: il frontend gira su un dominio separato
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(routes::create_router(
            db.clone(),
            broker.clone(),
            queue,
            config.clone(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Indirizzo non valido");

    tracing::info!("========================================");
    tracing::info!("  Clipflow API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================================");
    tracing::info!("Server: http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    tracing::info!("----------------------------------------");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  GET  /health/db               - Stato database");
    tracing::info!("  GET  /health/redis            - Stato broker");
    tracing::info!("  POST /api/v1/tasks            - Crea task");
    tracing::info!("  GET  /api/v1/tasks            - Lista task");
    tracing::info!("  GET  /api/v1/tasks/:id        - Stato task");
    tracing::info!("  GET  /api/v1/tasks/:id/result - Risultato task");
    tracing::info!("  GET  /api/v1/tasks/:id/clips  - Clip generate");
    tracing::info!("----------------------------------------");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Teardown: rilascio degli handle, no-op se mai stabiliti
    tracing::info!("Arresto Clipflow API...");
    db.close().await;
    broker.close();
    tracing::info!("Pulizia completata");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    tracing::info!("Segnale di arresto ricevuto");
}
