use std::time::Duration;

use {tokio::sync::mpsc, tracing::debug};

use chatloom_bridge::{Command, Message};

/// Coalesce rapid mark-as-read intents into at most one command per quiet
/// interval.
///
/// The first intent opens a window; every further intent restarts the timer
/// and replaces the buffered marker iff its timestamp is strictly later.
/// Once the stream has been quiet for `interval`, the buffered marker goes
/// out as a single `mark_message_as_read` and the next intent opens a fresh
/// window. Dropping the returned sender stops the task; a window still open
/// at that point is discarded.
pub fn debounce_read_marker(
    interval: Duration,
    output: mpsc::Sender<Command>,
) -> mpsc::Sender<Message> {
    let (input_tx, mut input_rx) = mpsc::channel::<Message>(16);

    tokio::spawn(async move {
        loop {
            // Idle until something opens a window.
            let Some(mut buffer) = input_rx.recv().await else {
                return;
            };

            loop {
                tokio::select! {
                    maybe = input_rx.recv() => match maybe {
                        Some(msg) => {
                            if msg.timestamp > buffer.timestamp {
                                buffer = msg;
                            }
                        },
                        None => return,
                    },
                    () = tokio::time::sleep(interval) => break,
                }
            }

            debug!(key = %buffer.key(), "emitting read marker");
            if output
                .send(Command::MarkMessageAsRead { message: buffer })
                .await
                .is_err()
            {
                return;
            }
        }
    });

    input_tx
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    fn marker(when: &str) -> Message {
        Message {
            channel: "general".into(),
            account: "irc.net".into(),
            timestamp: when.parse::<DateTime<Utc>>().unwrap(),
            ..Default::default()
        }
    }

    fn emitted(cmd: Command) -> Message {
        match cmd {
            Command::MarkMessageAsRead { message } => message,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn window_collapses_to_the_latest_timestamp() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let input = debounce_read_marker(Duration::from_secs(1), out_tx);

        input.send(marker("2021-01-01T00:00:01Z")).await.unwrap();
        input.send(marker("2021-01-01T00:00:02Z")).await.unwrap();

        let got = emitted(out_rx.recv().await.unwrap());
        assert_eq!(got.timestamp, marker("2021-01-01T00:00:02Z").timestamp);
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn older_intents_never_replace_the_buffer() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let input = debounce_read_marker(Duration::from_secs(1), out_tx);

        input.send(marker("2021-01-01T00:00:05Z")).await.unwrap();
        input.send(marker("2021-01-01T00:00:03Z")).await.unwrap();

        let got = emitted(out_rx.recv().await.unwrap());
        assert_eq!(got.timestamp, marker("2021-01-01T00:00:05Z").timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn a_new_intent_reopens_the_window() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let input = debounce_read_marker(Duration::from_secs(1), out_tx);

        input.send(marker("2021-01-01T00:00:01Z")).await.unwrap();
        let first = emitted(out_rx.recv().await.unwrap());
        assert_eq!(first.timestamp, marker("2021-01-01T00:00:01Z").timestamp);

        input.send(marker("2021-01-01T00:00:09Z")).await.unwrap();
        let second = emitted(out_rx.recv().await.unwrap());
        assert_eq!(second.timestamp, marker("2021-01-01T00:00:09Z").timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sender_stops_the_task_without_emitting() {
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let input = debounce_read_marker(Duration::from_secs(1), out_tx);

        input.send(marker("2021-01-01T00:00:01Z")).await.unwrap();
        drop(input);

        assert!(out_rx.recv().await.is_none());
    }
}
