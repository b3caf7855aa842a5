//! Line-delimited JSON protocol over stdin/stdout
//!
//! Each input line is one command. Each answer is written as one line
//! `{"response": ...}`; scheduler notifications are interleaved as
//! `{"notification": ...}` lines as they happen. Logs go to stderr, so
//! stdout carries nothing but protocol.

use super::App;
use crate::error::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Serve the protocol on the process's stdin and stdout
pub async fn run_stdio(app: &App) -> Result<()> {
    serve(app, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Restore schedules, answer commands from `input` until EOF or Ctrl-C,
/// then shut the schedulers down
pub async fn serve<R, W>(app: &App, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    app.schedulers.init().await?;
    info!("Serving commands on stdin");

    let (tx, rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(write_lines(rx, output));

    let mut events = app.schedulers.subscribe();
    let notifications = tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if notifications.send(json!({ "notification": event })).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Dropped scheduler notifications");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(input).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response = app.dispatcher.handle_json(&line).await;
                if tx.send(json!({ "response": response })).is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    app.schedulers.shutdown().await;
    forwarder.abort();
    drop(tx);
    if let Err(e) = writer.await {
        error!(error = %e, "Output writer failed");
    }
    Ok(())
}

async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<Value>, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        if let Err(e) = output.write_all(line.as_bytes()).await {
            error!(error = %e, "Failed to write to stdout");
            break;
        }
        if let Err(e) = output.flush().await {
            error!(error = %e, "Failed to flush stdout");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{Store, TimerRecord};
    use crate::test_utils::save_request;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    async fn run(app: &App, input: &str) -> Vec<Value> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        serve(app, input.as_bytes(), server).await.unwrap();
        let mut client = client;
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_answers_each_line_in_order() {
        let app = App::with_store(&Config::default(), Arc::new(Store::in_memory())).unwrap();
        let input = concat!(
            r#"{"type": "CREATE_REQUEST", "data": {"name": "a", "curl": "curl https://a.com"}}"#,
            "\n\n",
            "garbage\n",
            r#"{"type": "GET_ALL_REQUESTS"}"#,
            "\n"
        );

        let messages = run(&app, input).await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["response"]["success"], true);
        assert_eq!(messages[1]["response"]["success"], false);
        assert_eq!(messages[2]["response"][0]["name"], "a");
    }

    #[tokio::test]
    async fn test_notifications_are_interleaved() {
        let store = Arc::new(Store::in_memory());
        let request = save_request(&store, "t", "curl https://a.com").await;
        let app = App::with_store(&Config::default(), store).unwrap();
        let input = format!(
            "{}\n",
            json!({"type": "CRON_START", "requestId": request.id, "expression": "0 0 1 1 *"})
        );

        let messages = run(&app, &input).await;
        let notification = messages
            .iter()
            .find(|m| m.get("notification").is_some())
            .unwrap();
        assert_eq!(notification["notification"]["type"], "CRONS_UPDATED");
        assert!(messages
            .iter()
            .any(|m| m["response"]["success"] == true));
    }

    #[tokio::test]
    async fn test_schedules_restored_and_left_persisted() {
        let store = Arc::new(Store::in_memory());
        let request = save_request(&store, "t", "curl https://a.com").await;
        store
            .save_timers(&BTreeMap::from([(
                request.id.clone(),
                TimerRecord { interval: 3600 },
            )]))
            .await
            .unwrap();
        let app = App::with_store(&Config::default(), store.clone()).unwrap();

        let messages = run(&app, "{\"type\": \"TIMER_GET_ALL\"}\n").await;
        assert_eq!(messages[0]["response"][&request.id]["interval"], 3600);
        assert!(!app.schedulers.timers().is_running(&request.id).await);
        assert_eq!(store.get_timers().await.unwrap().len(), 1);
    }
}
