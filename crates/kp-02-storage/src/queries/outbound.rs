//! Durable FIFO of consensus messages.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::database::Tx;
use crate::domain::rows::OutboundMessage;
use crate::domain::tables::Table;
use crate::error::StorageResult;

impl Tx {
    /// Append a serialized message to the queue and return its id.
    pub fn schedule_shutter_message(
        &mut self,
        description: impl Into<String>,
        msg: Vec<u8>,
        now: DateTime<Utc>,
    ) -> StorageResult<u64> {
        let seq_key = Table::OutboundSequence.key().build();
        let id: u64 = self
            .get_row::<u64>(Table::OutboundSequence, &seq_key)?
            .map_or(1, |last| last + 1);
        self.put_row(Table::OutboundSequence, seq_key, &id)?;

        let row = OutboundMessage {
            id,
            description: description.into(),
            msg,
            created_at: now,
        };
        info!(id, description = %row.description, "scheduled shuttermint message");
        self.put_row(Table::OutboundMessage, outbound_key(id), &row)?;
        Ok(id)
    }

    /// Oldest queued message.
    pub fn get_next_shutter_message(&self) -> StorageResult<Option<OutboundMessage>> {
        Ok(self
            .scan_rows::<OutboundMessage>(Table::OutboundMessage, Table::OutboundMessage.prefix())?
            .into_iter()
            .next()
            .map(|(_, m)| m))
    }

    /// All queued messages in send order.
    pub fn get_shutter_messages(&self) -> StorageResult<Vec<OutboundMessage>> {
        Ok(self
            .scan_rows::<OutboundMessage>(Table::OutboundMessage, Table::OutboundMessage.prefix())?
            .into_iter()
            .map(|(_, m)| m)
            .collect())
    }

    pub fn delete_shutter_message(&mut self, id: u64) {
        self.delete_raw(outbound_key(id));
    }

    /// Drop queued messages with exactly `description`. Returns how many.
    pub fn delete_shutter_message_by_desc(&mut self, description: &str) -> StorageResult<usize> {
        let ids: Vec<u64> = self
            .get_shutter_messages()?
            .into_iter()
            .filter(|m| m.description == description)
            .map(|m| m.id)
            .collect();
        for id in &ids {
            self.delete_shutter_message(*id);
        }
        Ok(ids.len())
    }

    pub fn count_shutter_messages(&self) -> StorageResult<usize> {
        Ok(self.scan_raw(Table::OutboundMessage.prefix())?.len())
    }
}

fn outbound_key(id: u64) -> Vec<u8> {
    Table::OutboundMessage.key().u64(id).build()
}
