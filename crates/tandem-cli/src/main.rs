mod config;
mod device;

use std::sync::Arc;

use tandem_core::{QueueError, SequentialQueue};
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;
use crate::device::{Command, Device, DeviceError};

/// producer：自分のコマンドを順に submit し、結果を待つ
async fn producer(
    id: usize,
    queue: SequentialQueue,
    device: Arc<Device>,
    config: Arc<DemoConfig>,
) -> (usize, usize) {
    // 1) 全コマンドを先に submit（await しない）
    let submissions: Vec<_> = (0..config.commands_per_producer)
        .map(|sequence| {
            let global = id * config.commands_per_producer + sequence;
            let fail = config.fail_every > 0 && global % config.fail_every == config.fail_every - 1;
            queue.submit_operation(Command {
                device: Arc::clone(&device),
                producer: id,
                sequence,
                fail,
            })
        })
        .collect();

    // 2) 結果はそれぞれのハンドルにだけ届く
    let (mut ok, mut failed) = (0, 0);
    for submission in submissions {
        let seq = submission.seq();
        match submission.await {
            Ok(reply) => {
                ok += 1;
                tracing::info!(producer = id, seq, counter = reply.counter, "command ok");
            }
            Err(QueueError::Task(DeviceError::Collision(label))) => {
                failed += 1;
                tracing::error!(producer = id, seq, %label, "serialization violated");
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(producer = id, seq, error = %err, "command failed");
            }
        }
    }
    (ok, failed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) 設定、デバイス、キューを用意（デバイス 1 台につきキュー 1 本）
    let config = Arc::new(DemoConfig::from_env()?);
    tracing::info!(?config, "starting demo");

    let device = Arc::new(Device::new(config.command_delay));
    let queue = SequentialQueue::builder().name("demo-device").build();

    // (B) producer を同時に起動
    let producers: Vec<_> = (0..config.producers)
        .map(|id| {
            tokio::spawn(producer(
                id,
                queue.clone(),
                Arc::clone(&device),
                Arc::clone(&config),
            ))
        })
        .collect();

    let (mut ok, mut failed) = (0, 0);
    for handle in producers {
        let (o, f) = handle.await?;
        ok += o;
        failed += f;
    }

    // (C) キューが空になったら集計を出す
    queue.idle().await;
    tracing::info!(
        ok,
        failed,
        handled = device.handled(),
        expected = config.total_commands(),
        "all producers finished"
    );
    println!("{}", serde_json::to_string_pretty(&queue.stats())?);

    Ok(())
}
