use std::sync::Arc;

use quicktask_core::impls::InMemoryRemote;
use quicktask_core::{ClientConfig, MutationReconciler, NewTask, RemoteError, TaskPatch, TaskSnapshot};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_snapshot(label: &str, snapshot: &TaskSnapshot) {
    println!("--- {label} ({:?})", snapshot.counts());
    for task in snapshot {
        let mark = if task.completed { "x" } else { " " };
        println!("[{mark}] {} {}", task.id, task.title);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // (A) 設定を読む（引数があれば JSON ファイル、なければデフォルト）
    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    // QUICKTASK_LOG が優先、なければ設定の log_filter
    let filter = EnvFilter::try_from_env("QUICKTASK_LOG")
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // (B) インメモリのサーバーを用意して seed を入れる
    let remote = Arc::new(InMemoryRemote::new().with_latency(config.remote_latency()));
    for draft in &config.seed {
        remote.seed(draft)?;
    }

    // (C) 一覧を取得してから intent を発行
    let reconciler = MutationReconciler::new(Arc::clone(&remote));
    reconciler.refresh().await?;
    print_snapshot("initial", &reconciler.snapshot());

    let milk = reconciler.add(NewTask::new("Buy milk")).await?;
    info!(task_id = %milk.id, "added");

    let milk = reconciler.toggle_complete(&milk.id).await?;
    reconciler
        .update(&milk.id, TaskPatch::default().description(Some("2 liters".to_string())))
        .await?;
    print_snapshot("after add/toggle/update", &reconciler.snapshot());

    // (D) 障害を注入してロールバックを確認
    remote.fail_next(RemoteError::Network("connection reset".to_string()));
    if let Err(err) = reconciler.toggle_complete(&milk.id).await {
        println!("toggle failed: {err}");
        if let Some(surfaced) = reconciler.last_error() {
            println!("last_error: kind={:?} message={}", surfaced.kind, surfaced.message);
        }
        print_snapshot("after rolled back toggle", &reconciler.snapshot());

        // 再送できる失敗なら一度だけやり直す
        if err.is_retryable() {
            reconciler.clear_error();
            reconciler.toggle_complete(&milk.id).await?;
            print_snapshot("after retry", &reconciler.snapshot());
        }
    }

    // (E) 削除して終わり
    reconciler.delete(&milk.id).await?;
    let last = reconciler.snapshot();
    print_snapshot("final", &last);
    println!("{}", serde_json::to_string_pretty(&*last)?);
    println!("server holds {} task(s)", remote.tasks().len());

    Ok(())
}
