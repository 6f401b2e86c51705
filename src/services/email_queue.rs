//! Outbound email queue and its delivery worker
//!
//! Many producers offer messages, one consumer streams them out in order.
//! Closing the queue lets the consumer drain what is already buffered and
//! then end.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::adapters::EmailClient;
use crate::coordination::ShutdownToken;
use crate::domain::Email;
use crate::error::{LeagueError, Result};
use crate::supervisor::Worker;

/// Per-message delivery budget
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded FIFO of outbound messages
pub struct EmailQueue {
    tx: Mutex<Option<mpsc::Sender<Email>>>,
    rx: Mutex<Option<mpsc::Receiver<Email>>>,
}

impl EmailQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Enqueue a message, waiting for room when the queue is full
    pub async fn offer(&self, email: Email) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| LeagueError::Internal("email queue is closed".into()))?;

        tx.send(email)
            .await
            .map_err(|_| LeagueError::Internal("email queue consumer has gone away".into()))
    }

    /// The single consumer's view of the queue
    pub fn stream(&self) -> Result<BoxStream<'static, Email>> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| LeagueError::Conflict("email queue already has a consumer".into()))?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|email| (email, rx))
        })
        .boxed())
    }

    /// Stop accepting messages; idempotent
    pub fn close(&self) {
        if self
            .tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some()
        {
            debug!("Email queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// Counters reported by the worker
#[derive(Debug, Default)]
pub struct DeliveryStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub logged: AtomicU64,
}

/// Drains the queue through an [`EmailClient`], or into the log when none is configured
pub struct EmailQueueWorker {
    queue: Arc<EmailQueue>,
    client: Option<Arc<dyn EmailClient>>,
    send_timeout: Duration,
    stats: DeliveryStats,
}

impl EmailQueueWorker {
    pub fn new(queue: Arc<EmailQueue>, client: Option<Arc<dyn EmailClient>>) -> Self {
        Self {
            queue,
            client,
            send_timeout: SEND_TIMEOUT,
            stats: DeliveryStats::default(),
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    async fn deliver(&self, email: &Email) {
        let Some(client) = &self.client else {
            info!(
                to = %email.to.mailbox(),
                subject = %email.subject,
                body = %email.plain_text,
                "Email (no client configured)"
            );
            self.stats.logged.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match tokio::time::timeout(self.send_timeout, client.send(email)).await {
            Ok(Ok(())) => {
                debug!(to = %email.to.address, subject = %email.subject, "Email sent");
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                error!(to = %email.to.address, subject = %email.subject, error = %e, "Email send failed");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                warn!(
                    to = %email.to.address,
                    subject = %email.subject,
                    timeout_secs = self.send_timeout.as_secs(),
                    "Email send timed out"
                );
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[async_trait]
impl Worker for EmailQueueWorker {
    fn name(&self) -> &str {
        "email-queue"
    }

    async fn run(&self, token: ShutdownToken) -> Result<()> {
        let mut messages = self.queue.stream()?;
        let mut closing = false;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled(), if !closing => {
                    closing = true;
                    self.queue.close();
                }
                next = messages.next() => match next {
                    Some(email) => self.deliver(&email).await,
                    None => break,
                },
            }
        }

        info!(
            delivered = self.stats.delivered.load(Ordering::Relaxed),
            failed = self.stats.failed.load(Ordering::Relaxed),
            logged = self.stats.logged.load(Ordering::Relaxed),
            "Email queue drained"
        );
        Ok(())
    }

    async fn halt(&self) -> Result<()> {
        self.queue.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockEmailClient;
    use crate::domain::Identity;
    use std::sync::Mutex as StdMutex;

    fn email(subject: &str) -> Email {
        Email {
            from: Identity::new("League", "noreply@example.com"),
            to: Identity::new("Entrant", "entrant@example.com"),
            reply_to: Identity::new("League", "hello@example.com"),
            sender_domain: "mg.example.com".into(),
            subject: subject.into(),
            plain_text: "body".into(),
        }
    }

    #[tokio::test]
    async fn test_fifo_and_close_drains() {
        let queue = EmailQueue::new(10);
        for i in 0..5 {
            queue.offer(email(&format!("m{}", i))).await.unwrap();
        }
        queue.close();
        queue.close();
        assert!(queue.is_closed());
        assert!(queue.offer(email("late")).await.is_err());

        let subjects: Vec<String> = queue.stream().unwrap().map(|e| e.subject).collect().await;
        assert_eq!(subjects, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_single_consumer() {
        let queue = EmailQueue::new(1);
        let _stream = queue.stream().unwrap();
        assert!(matches!(queue.stream(), Err(LeagueError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_worker_sends_in_order_and_survives_failures() {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let mut client = MockEmailClient::new();
        {
            let sent = Arc::clone(&sent);
            client.expect_send().times(3).returning(move |email| {
                sent.lock().unwrap().push(email.subject.clone());
                if email.subject == "b" {
                    Err(LeagueError::Transient("provider down".into()))
                } else {
                    Ok(())
                }
            });
        }

        let queue = Arc::new(EmailQueue::new(10));
        let worker = EmailQueueWorker::new(Arc::clone(&queue), Some(Arc::new(client)));
        for s in ["a", "b", "c"] {
            queue.offer(email(s)).await.unwrap();
        }
        worker.halt().await.unwrap();
        worker.run(ShutdownToken::new()).await.unwrap();

        assert_eq!(*sent.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(worker.stats().delivered.load(Ordering::Relaxed), 2);
        assert_eq!(worker.stats().failed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_worker_logs_without_client_and_stops_on_cancel() {
        let queue = Arc::new(EmailQueue::new(10));
        let worker = Arc::new(EmailQueueWorker::new(Arc::clone(&queue), None));
        let token = ShutdownToken::new();

        let handle = {
            let worker = Arc::clone(&worker);
            let token = token.clone();
            tokio::spawn(async move { worker.run(token).await })
        };

        queue.offer(email("hello")).await.unwrap();
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(worker.stats().logged.load(Ordering::Relaxed), 1);
    }
}
