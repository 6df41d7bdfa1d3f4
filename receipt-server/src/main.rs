use actix_web::web::{Data, PayloadConfig};
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, WriteMode,
};
use std::sync::Arc;
use std::time::Duration;

use receipt_common::db::create_db_thread_pool;
use receipt_common::token::TokenSigningKey;
use receipt_common::vision::{
    AnalysisClient, AnalysisTransport, ClassifyImage, CustomVisionClassifier,
    FormRecognizerTransport, MockAnalysisTransport, MockClassifier,
};

use crate::ingest::{DbReceiptStore, IngestionPipeline};

mod env;
mod handlers;
mod ingest;
mod middleware;
mod services;

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = {
                    let next_arg = args.next();

                    match next_arg {
                        Some(s) => s,
                        None => {
                            eprintln!("ERROR: --port option specified but no port was given");
                            std::process::exit(1);
                        }
                    }
                };

                port = {
                    let port_result = port_str.parse::<u16>();

                    match port_result {
                        Ok(p) => p,
                        Err(_) => {
                            eprintln!("ERROR: Incorrect format for port. Integer expected");
                            std::process::exit(1);
                        }
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let base_addr = format!("127.0.0.1:{}", &port);

    let _logger = Logger::try_with_str(&env::CONF.log_level)
        .expect("Invalid log level")
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    let cpu_count = num_cpus::get();

    let actix_workers = env::CONF.actix_worker_count;
    let db_max_connections = env::CONF.db_max_connections;

    // To prevent resource starvation, max connections must be at least as large as the number of
    // actix workers
    let db_max_connections = if actix_workers > db_max_connections as usize {
        actix_workers as u32
    } else {
        db_max_connections
    };

    log::info!("Connecting to database (cpu count {cpu_count})...");

    let db_thread_pool = match create_db_thread_pool(
        &env::CONF.database_uri(),
        db_max_connections,
        env::CONF.db_idle_timeout,
    ) {
        Ok(pool) => pool,
        Err(_) => {
            eprintln!("ERROR: Failed to connect to database");
            std::process::exit(1);
        }
    };

    log::info!("Successfully connected to database");

    let http_client = reqwest::Client::builder()
        .timeout(HTTP_CLIENT_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client");

    let classifier: Arc<dyn ClassifyImage> = if env::CONF.vision_enabled {
        Arc::new(CustomVisionClassifier::new(
            http_client.clone(),
            env::CONF.classifier_prediction_url.clone(),
            env::CONF.classifier_prediction_key.clone(),
            env::CONF.classifier_confidence_threshold,
        ))
    } else {
        log::info!("Vision services are disabled. Using mock classifier.");
        Arc::new(MockClassifier::accepting())
    };

    let analysis_transport: Box<dyn AnalysisTransport> = if env::CONF.vision_enabled {
        Box::new(FormRecognizerTransport::new(
            http_client,
            env::CONF.analysis_endpoint.clone(),
            env::CONF.analysis_key.clone(),
        ))
    } else {
        log::info!("Vision services are disabled. Using mock analysis transport.");
        Box::new(MockAnalysisTransport::succeeding())
    };

    let analysis = Arc::new(AnalysisClient::new(
        analysis_transport,
        env::CONF.analysis_poll,
    ));

    let store = Arc::new(DbReceiptStore::new(db_thread_pool.clone()));
    let pipeline = Data::new(IngestionPipeline::new(store, classifier, analysis));

    let signing_key = TokenSigningKey::new(env::CONF.token_signing_key);

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(db_thread_pool.clone()))
            .app_data(pipeline.clone())
            .app_data(Data::new(signing_key.clone()))
            .app_data(PayloadConfig::new(env::CONF.max_upload_bytes))
            .configure(services::api::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(actix_workers)
    .bind(base_addr)?
    .run()
    .await?;

    Ok(())
}
