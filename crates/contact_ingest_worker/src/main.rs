//! Process entry point (§4.10): parse settings, initialize logging, stand
//! up the database/blob/queue collaborators, then run the consumer loop
//! until an interrupt is observed.

use aws_config::BehaviorVersion;
use contact_ingest_db::ContactDb;
use contact_ingest_logging::{init_logging, LogConfig};
use contact_ingest_protocol::Settings;
use contact_ingest_worker::blob::S3BlobStore;
use contact_ingest_worker::consumer::{Consumer, ConsumerConfig};
use contact_ingest_worker::queue::SqsMessageQueue;
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load();

    init_logging(LogConfig {
        level: &settings.log_level,
        json: settings.log_format_is_json(),
    })?;

    info!(
        aws_region = %settings.aws_region,
        bucket = %settings.csv_bucket_name,
        "starting contact ingest worker"
    );

    let db = ContactDb::connect(&settings.database_url).await?;

    let aws_cfg = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(settings.aws_region.clone()))
        .load()
        .await;

    let s3_client = aws_sdk_s3::Client::new(&aws_cfg);
    let blob = S3BlobStore::new(s3_client, settings.csv_bucket_name.clone());

    let sqs_client = aws_sdk_sqs::Client::new(&aws_cfg);
    let queue = SqsMessageQueue::new(sqs_client, settings.sqs_queue_url.clone());

    let consumer_config = ConsumerConfig {
        max_number_of_messages: settings.sqs_max_number_of_messages,
        wait_time_seconds: settings.sqs_wait_time_seconds,
        retry_delay_seconds: settings.retry_delay_seconds,
        progress_update_interval: settings.progress_update_interval,
    };

    let consumer = Consumer::new(&queue, &db, &blob, consumer_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_interrupt().await;
        info!("interrupt received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    consumer.run(shutdown_rx).await;

    info!("contact ingest worker exiting cleanly");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    let _ = tokio::signal::ctrl_c().await;
}
