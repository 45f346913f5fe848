//! Outbound queue flush.
//!
//! Messages leave the queue strictly oldest first. A row is deleted only
//! after the chain accepted it, so a crash between send and delete resends
//! the message; the application answers a duplicate with `SEEN`.

use keyper_telemetry::KeyperMetrics;
use kp_02_storage::Database;
use tracing::{debug, error, info, warn};

use crate::domain::messages::Message;
use crate::error::SenderResult;
use crate::ports::outbound::MessageSender;

/// Send queued messages until the queue is empty or a send fails.
/// Returns how many messages were sent.
///
/// A failed send ends the flush and keeps the row for the next call. A
/// non-retriable rejection leaves the row at the head of the queue; it is
/// counted in `outbound_messages_rejected` and flagged by
/// `outbound_queue_blocked` until a later send goes through.
pub async fn send_shutter_messages(
    db: &Database,
    sender: &dyn MessageSender,
    metrics: Option<&KeyperMetrics>,
) -> SenderResult<usize> {
    let mut sent = 0;
    loop {
        let next = db.read().get_next_shutter_message()?;
        let Some(row) = next else {
            break;
        };

        let msg = match Message::decode(&row.msg) {
            Ok(msg) => msg,
            Err(err) => {
                error!(id = row.id, description = %row.description, %err, "dropping undecodable queued message");
                let mut tx = db.begin().await;
                tx.delete_shutter_message(row.id);
                tx.commit()?;
                continue;
            }
        };

        match sender.send_message(&msg).await {
            Ok(()) => {
                let mut tx = db.begin().await;
                tx.delete_shutter_message(row.id);
                tx.commit()?;
                sent += 1;
                if let Some(metrics) = metrics {
                    metrics
                        .outbound_messages_sent
                        .with_label_values(&[msg.kind()])
                        .inc();
                    metrics.outbound_queue_blocked.set(0);
                }
                info!(id = row.id, description = %row.description, "sent shuttermint message");
            }
            Err(err) if err.is_retriable() => {
                warn!(id = row.id, description = %row.description, %err, "sending shuttermint message failed, will retry");
                break;
            }
            Err(err) => {
                error!(id = row.id, description = %row.description, %err, "shuttermint rejected message, queue is blocked");
                if let Some(metrics) = metrics {
                    metrics
                        .outbound_messages_rejected
                        .with_label_values(&[msg.kind()])
                        .inc();
                    metrics.outbound_queue_blocked.set(1);
                }
                break;
            }
        }
    }

    let depth = db.read().count_shutter_messages()?;
    if let Some(metrics) = metrics {
        metrics.outbound_queue_depth.set(depth as i64);
    }
    debug!(sent, remaining = depth, "outbound queue flushed");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sender::MockMessageSender;
    use crate::error::SenderError;
    use chrono::Utc;

    async fn enqueue(db: &Database, msg: &Message) {
        let mut tx = db.begin().await;
        tx.schedule_shutter_message(msg.description(), msg.encode().unwrap(), Utc::now())
            .unwrap();
        tx.commit().unwrap();
    }

    fn block_seen(n: u64) -> Message {
        Message::BlockSeen { block_number: n }
    }

    #[tokio::test]
    async fn test_flush_in_order() {
        let db = Database::in_memory();
        for n in 1..=3 {
            enqueue(&db, &block_seen(n)).await;
        }
        let (sender, mut rx) = MockMessageSender::new();
        let metrics = KeyperMetrics::detached().unwrap();

        assert_eq!(send_shutter_messages(&db, &sender, Some(&metrics)).await.unwrap(), 3);
        for n in 1..=3 {
            assert_eq!(rx.recv().await.unwrap(), block_seen(n));
        }
        assert_eq!(db.begin().await.count_shutter_messages().unwrap(), 0);
        assert_eq!(metrics.outbound_queue_depth.get(), 0);
        assert_eq!(
            metrics
                .outbound_messages_sent
                .with_label_values(&["block_seen"])
                .get(),
            3
        );
    }

    #[tokio::test]
    async fn test_retriable_failure_keeps_message() {
        let db = Database::in_memory();
        enqueue(&db, &block_seen(1)).await;
        enqueue(&db, &block_seen(2)).await;
        let (sender, mut rx) = MockMessageSender::new();
        sender.fail_next(SenderError::Remote {
            message: "checktx: mempool full".into(),
            retriable: true,
        });

        assert_eq!(send_shutter_messages(&db, &sender, None).await.unwrap(), 0);
        assert_eq!(db.begin().await.count_shutter_messages().unwrap(), 2);

        assert_eq!(send_shutter_messages(&db, &sender, None).await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), block_seen(1));
    }

    #[tokio::test]
    async fn test_rejected_message_stops_flush() {
        let db = Database::in_memory();
        enqueue(&db, &block_seen(1)).await;
        enqueue(&db, &block_seen(2)).await;
        let (sender, _rx) = MockMessageSender::new();
        sender.fail_next(SenderError::Remote {
            message: "delivertx (code 1)".into(),
            retriable: false,
        });

        assert_eq!(send_shutter_messages(&db, &sender, None).await.unwrap(), 0);
        let tx = db.begin().await;
        let head = tx.get_next_shutter_message().unwrap().unwrap();
        assert_eq!(head.description, block_seen(1).description());
    }

    #[tokio::test]
    async fn test_rejected_message_is_counted() {
        let db = Database::in_memory();
        enqueue(&db, &block_seen(1)).await;
        let (sender, mut rx) = MockMessageSender::new();
        let metrics = KeyperMetrics::detached().unwrap();
        sender.fail_next(SenderError::Remote {
            message: "delivertx (code 1)".into(),
            retriable: false,
        });

        assert_eq!(send_shutter_messages(&db, &sender, Some(&metrics)).await.unwrap(), 0);
        let rejected = metrics
            .outbound_messages_rejected
            .with_label_values(&["block_seen"]);
        assert_eq!(rejected.get(), 1);
        assert_eq!(metrics.outbound_queue_blocked.get(), 1);
        assert_eq!(metrics.outbound_queue_depth.get(), 1);

        // the head goes through on the next flush and clears the flag
        assert_eq!(send_shutter_messages(&db, &sender, Some(&metrics)).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), block_seen(1));
        assert_eq!(rejected.get(), 1);
        assert_eq!(metrics.outbound_queue_blocked.get(), 0);
        assert_eq!(metrics.outbound_queue_depth.get(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_row_is_dropped() {
        let db = Database::in_memory();
        {
            let mut tx = db.begin().await;
            tx.schedule_shutter_message("garbage", vec![0xff; 3], Utc::now())
                .unwrap();
            tx.commit().unwrap();
        }
        enqueue(&db, &block_seen(9)).await;
        let (sender, mut rx) = MockMessageSender::new();

        assert_eq!(send_shutter_messages(&db, &sender, None).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), block_seen(9));
    }
}
