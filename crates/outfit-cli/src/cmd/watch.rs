use outfit_client::{ChannelState, Outfit};
use serde_json::Value;
use tokio::sync::mpsc;

/// Print every push from the live channel, one JSON document per line,
/// until Ctrl-C, `count` messages, or the channel gives up reconnecting.
pub async fn run(outfit: &Outfit, count: Option<usize>, json: bool) -> anyhow::Result<()> {
    let channel = outfit.realtime();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    channel.on_message(move |msg| {
        let _ = tx.send(msg);
    });
    let mut state = channel.subscribe();

    if let Err(e) = channel.connect().await {
        tracing::warn!(url = channel.url(), error = %e, "initial connect failed; retrying");
    } else {
        tracing::info!(url = channel.url(), "watching live updates");
    }

    let mut seen = 0usize;
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = *state.borrow_and_update();
                match current {
                    ChannelState::GaveUp => {
                        break Err(anyhow::anyhow!(
                            "live channel at {} is unreachable; gave up after {} attempts",
                            channel.url(),
                            channel.attempts()
                        ));
                    }
                    other => tracing::info!(state = other.as_str(), "live channel"),
                }
            }
            Some(msg) = rx.recv() => {
                if let Err(e) = print_message(&msg, json) {
                    break Err(e.context("failed to print message"));
                }
                seen += 1;
                if count.is_some_and(|n| seen >= n) {
                    break Ok(());
                }
            }
        }
    };

    channel.disconnect();
    outcome
}

fn print_message(msg: &Value, json: bool) -> anyhow::Result<()> {
    let line = if json {
        serde_json::to_string(msg)?
    } else {
        describe(msg)?
    };
    println!("{line}");
    Ok(())
}

/// `analysis_progress  a1  40%`
fn describe(msg: &Value) -> serde_json::Result<String> {
    let kind = msg.get("type").and_then(Value::as_str).unwrap_or("message");
    Ok(
        match (analysis_id(msg), msg.get("progress").and_then(Value::as_f64)) {
            (Some(id), Some(p)) => format!("{kind}  {id}  {p:.0}%"),
            (Some(id), None) => format!("{kind}  {id}"),
            _ => format!("{kind}  {}", serde_json::to_string(msg)?),
        },
    )
}

fn analysis_id(msg: &Value) -> Option<&str> {
    msg.get("analysisId")
        .or_else(|| msg.get("id"))
        .and_then(Value::as_str)
}
