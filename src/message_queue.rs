/*!
 * Message queue abstraction used for asynchronous job dispatch.
 *
 * Email jobs are published here and drained by an external worker; the API
 * never waits on delivery. Two backends are provided: an in-memory queue for
 * development and tests, and a Redis list-backed queue for deployments.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Message queue errors
#[derive(Error, Debug)]
pub enum MessageQueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Envelope for queued items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Message {
    pub fn new(topic: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            payload,
            timestamp: chrono::Utc::now(),
            retry_count: 0,
            max_retries: 3,
        }
    }
}

/// Queue trait; consumers poll per topic.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError>;
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError>;
    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
}

/// In-memory queue; one bounded FIFO per topic.
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<Message>>>>,
    max_size: usize,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::with_max_size(1000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            max_size,
        }
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(message.topic.clone()).or_default();

        if queue.len() >= self.max_size {
            return Err(MessageQueueError::QueueFull);
        }

        queue.push_back(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(topic).and_then(|q| q.pop_front()))
    }

    async fn ack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }

    async fn nack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }
}

/// Redis-backed queue: one list per namespaced topic, LPUSH to publish and
/// BRPOP (bounded block) to consume.
pub struct RedisMessageQueue {
    client: Arc<redis::Client>,
    namespace: String,
    block_timeout: Duration,
}

impl RedisMessageQueue {
    pub async fn new(
        client: Arc<redis::Client>,
        namespace: String,
        block_timeout: Duration,
    ) -> Result<Self, MessageQueueError> {
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            namespace,
            block_timeout,
        })
    }

    fn topic_key(&self, topic: &str) -> String {
        format!("{}:{}", self.namespace, topic)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        redis::cmd("LPUSH")
            .arg(self.topic_key(&message.topic))
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        let reply: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(self.topic_key(topic))
            .arg(self.block_timeout.as_secs() as usize)
            .query_async(&mut conn)
            .await
            .map_err(|e| MessageQueueError::ConnectionError(e.to_string()))?;

        match reply {
            Some((_, raw)) => {
                let message: Message = serde_json::from_str(&raw)
                    .map_err(|e| MessageQueueError::SerializationError(e.to_string()))?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        // BRPOP removes the item; there is nothing left to acknowledge.
        Ok(())
    }

    async fn nack(&self, _message_id: &Uuid) -> Result<(), MessageQueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_queue_is_fifo_per_topic() {
        let queue = InMemoryMessageQueue::new();
        let first = Message::new("jobs".to_string(), serde_json::json!({"n": 1}));
        let second = Message::new("jobs".to_string(), serde_json::json!({"n": 2}));

        queue.publish(first.clone()).await.unwrap();
        queue.publish(second).await.unwrap();

        let received = queue.subscribe("jobs").await.unwrap().unwrap();
        assert_eq!(received.id, first.id);

        assert!(queue.subscribe("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_queue_rejects_overflow() {
        let queue = InMemoryMessageQueue::with_max_size(1);
        queue
            .publish(Message::new("t".into(), serde_json::json!({})))
            .await
            .unwrap();
        let err = queue
            .publish(Message::new("t".into(), serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, MessageQueueError::QueueFull));
    }
}
