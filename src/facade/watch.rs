//! Standing event subscriptions.
//!
//! ```text
//! producer task                         consumer task
//!   push stream (ws)  ─┐
//!                      ├─ decode ─► mpsc(capacity) ─► on_event(DecodedLog)
//!   poll new blocks  ──┘
//!        │ errors
//!        └──────────────► error channel (optional)
//! ```
//!
//! Both tasks watch one stop signal. [`EventWatch::unsubscribe`] fires it and
//! joins both tasks, so no callback can run once it has returned.

use alloy::json_abi::Event;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::blockchain::abi::ContractDescriptor;
use crate::blockchain::client::{ChainClient, LogStream};
use crate::blockchain::types::{BlockchainResult, ChainError, DecodedLog, LogFilter, RawLog};
use crate::facade::logs::decode_log;
use crate::facade::{poll_period, ChainFacade};
use crate::observability::metrics;

/// Handle to a running subscription.
///
/// Dropping the handle also stops the subscription, but only
/// [`unsubscribe`](Self::unsubscribe) waits for the tasks to finish.
#[derive(Debug)]
pub struct EventWatch {
    event: String,
    stop_tx: watch::Sender<bool>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl EventWatch {
    /// Event name this watch delivers.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Whether both tasks are still running.
    pub fn is_active(&self) -> bool {
        !self.producer.is_finished() && !self.consumer.is_finished()
    }

    /// Stop delivery. No `on_event` call happens after this returns.
    pub async fn unsubscribe(self) {
        let _ = self.stop_tx.send(true);
        for (task, handle) in [("producer", self.producer), ("consumer", self.consumer)] {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(event = %self.event, task = task, "Watch task panicked");
                }
            }
        }
        tracing::info!(event = %self.event, "Unsubscribed");
    }
}

impl ChainFacade {
    /// Subscribe to `event` emitted by `descriptor`.
    ///
    /// `on_event` runs once per matching log, in transport order, on a
    /// dedicated task. Failures after the subscription is established are sent
    /// to `errors` (when given) and the watch keeps running.
    pub async fn watch_event<F>(
        &self,
        descriptor: &ContractDescriptor,
        event: &str,
        on_event: F,
        errors: Option<mpsc::UnboundedSender<ChainError>>,
    ) -> BlockchainResult<EventWatch>
    where
        F: FnMut(DecodedLog) + Send + 'static,
    {
        let abi_event = descriptor.event(event)?.clone();
        let filter = LogFilter::new(descriptor.address(), abi_event.selector());

        let source = match self.client.subscribe_logs(&filter).await? {
            Some(stream) => LogSource::Push(stream),
            None => {
                let head = self.client.block_number().await?;
                LogSource::Poll {
                    last_block: head,
                    ticker: poll_ticker(self.config.watch.poll_interval()),
                }
            }
        };

        tracing::info!(
            contract = descriptor.name(),
            address = %descriptor.address(),
            event = event,
            mode = source.mode(),
            "Watching event"
        );

        let (stop_tx, stop_rx) = watch::channel(false);
        let (event_tx, event_rx) = mpsc::channel(self.config.watch.channel_capacity.max(1));

        let producer = Producer {
            client: self.client.clone(),
            event: abi_event,
            filter,
            source,
            events: event_tx,
            errors,
        };
        let producer = tokio::spawn(producer.run(stop_rx.clone()));
        let consumer = tokio::spawn(consume(event_rx, on_event, stop_rx));

        Ok(EventWatch {
            event: event.to_string(),
            stop_tx,
            producer,
            consumer,
        })
    }
}

fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = interval(poll_period(period));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

enum LogSource {
    Push(LogStream),
    Poll { last_block: u64, ticker: Interval },
}

impl LogSource {
    fn mode(&self) -> &'static str {
        match self {
            LogSource::Push(_) => "subscribe",
            LogSource::Poll { .. } => "poll",
        }
    }
}

struct Producer {
    client: Arc<dyn ChainClient>,
    event: Event,
    filter: LogFilter,
    source: LogSource,
    events: mpsc::Sender<DecodedLog>,
    errors: Option<mpsc::UnboundedSender<ChainError>>,
}

impl Producer {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed() => break,
                keep_going = self.step() => {
                    if !keep_going {
                        break;
                    }
                }
            }
        }
        tracing::debug!(event = %self.event.name, "Watch producer stopped");
    }

    /// One unit of work. Returns `false` when the subscription cannot continue.
    async fn step(&mut self) -> bool {
        match &mut self.source {
            LogSource::Push(stream) => match stream.next().await {
                Some(log) => self.forward(std::slice::from_ref(&log)).await,
                None => {
                    self.report(ChainError::Transport("Log subscription closed".to_string()));
                    false
                }
            },
            LogSource::Poll { last_block, ticker } => {
                ticker.tick().await;
                let from = *last_block + 1;

                let head = match self.client.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        self.report(e);
                        return true;
                    }
                };
                if head < from {
                    return true;
                }

                let filter = self.filter.clone().blocks(from, head);
                let logs = match self.client.logs(&filter).await {
                    Ok(logs) => logs,
                    Err(e) => {
                        self.report(e);
                        return true;
                    }
                };

                if let LogSource::Poll { last_block, .. } = &mut self.source {
                    *last_block = head;
                }
                self.forward(&logs).await
            }
        }
    }

    async fn forward(&mut self, logs: &[RawLog]) -> bool {
        for log in logs {
            if log.removed {
                tracing::debug!(event = %self.event.name, block = ?log.block_number, "Skipping removed log");
                continue;
            }
            let Some(decoded) = decode_log(&self.event, log) else {
                tracing::debug!(event = %self.event.name, "Skipping undecodable log");
                continue;
            };
            if self.events.send(decoded).await.is_err() {
                return false;
            }
        }
        true
    }

    fn report(&self, error: ChainError) {
        tracing::warn!(event = %self.event.name, error = %error, "Watch delivery error");
        if let Some(errors) = &self.errors {
            let _ = errors.send(error);
        }
    }
}

async fn consume<F>(
    mut events: mpsc::Receiver<DecodedLog>,
    mut on_event: F,
    mut stop_rx: watch::Receiver<bool>,
) where
    F: FnMut(DecodedLog) + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            next = events.recv() => match next {
                Some(event) => {
                    metrics::record_event_delivered(&event.event);
                    on_event(event);
                }
                None => break,
            },
        }
    }
}
