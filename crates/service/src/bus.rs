//! Message bus: runs a command or event and everything it causes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use domain::{Command, Event, Message};
use identity_store::SessionFactory;
use tracing::Instrument;

use crate::broker::MessageBroker;
use crate::context::HandlerContext;
use crate::error::BusError;
use crate::notification::Notifier;
use crate::registry::HandlerRegistry;
use crate::unit_of_work::UnitOfWork;

/// Routes messages to their handlers, breadth first.
///
/// Each call to [`MessageBus::handle`] owns a FIFO queue seeded with the
/// message and a fresh [`HandlerContext`]. Events committed by a handler are
/// appended to the tail of that queue. Commands fail loud: the first handler
/// error ends the call. Event handlers fail soft: errors are logged and the
/// remaining handlers still run.
pub struct MessageBus {
    registry: HandlerRegistry,
    sessions: Arc<dyn SessionFactory>,
    broker: Arc<dyn MessageBroker>,
    notifier: Arc<dyn Notifier>,
    admin_address: Arc<str>,
}

impl MessageBus {
    pub fn new(
        registry: HandlerRegistry,
        sessions: Arc<dyn SessionFactory>,
        broker: Arc<dyn MessageBroker>,
        notifier: Arc<dyn Notifier>,
        admin_address: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            registry,
            sessions,
            broker,
            notifier,
            admin_address: admin_address.into(),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// A context with a unit of work of its own.
    pub fn context(&self) -> HandlerContext {
        HandlerContext {
            uow: UnitOfWork::new(self.sessions.clone()),
            broker: self.broker.clone(),
            notifier: self.notifier.clone(),
            admin_address: self.admin_address.clone(),
        }
    }

    /// Handles `message` and every event it causes.
    pub async fn handle(&self, message: impl Into<Message>) -> Result<(), BusError> {
        let message = message.into();
        let span = tracing::info_span!("bus.handle", message = message.name());
        self.run(VecDeque::from([message])).instrument(span).await
    }

    /// Continues with the residual messages of a failed call.
    #[tracing::instrument(skip_all, fields(pending = residual.len()))]
    pub async fn resume(&self, residual: Vec<Message>) -> Result<(), BusError> {
        self.run(residual.into()).await
    }

    async fn run(&self, mut queue: VecDeque<Message>) -> Result<(), BusError> {
        let mut ctx = self.context();

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Event(event) => self.dispatch_event(&event, &mut ctx, &mut queue).await,
                Message::Command(command) => {
                    self.dispatch_command(&command, &mut ctx, &mut queue)
                        .await?
                }
            }
        }

        Ok(())
    }

    async fn dispatch_event(
        &self,
        event: &Event,
        ctx: &mut HandlerContext,
        queue: &mut VecDeque<Message>,
    ) {
        let handlers = self.registry.event_handlers(event.kind());
        metrics::counter!("bus_events_total", "event" => event.name()).increment(1);
        if handlers.is_empty() {
            tracing::debug!(event = event.name(), "no handlers for event");
        }

        for handler in handlers {
            let start = Instant::now();
            let result = handler.handle(event, ctx).await;
            ctx.uow.exit().await;
            metrics::histogram!("bus_dispatch_duration_seconds", "handler" => handler.name())
                .record(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => tracing::debug!(
                    event = event.name(),
                    handler = handler.name(),
                    "event handled"
                ),
                Err(e) => {
                    metrics::counter!("bus_handler_failures_total", "handler" => handler.name())
                        .increment(1);
                    tracing::error!(
                        event = event.name(),
                        handler = handler.name(),
                        error = %e,
                        "event handler failed"
                    );
                }
            }

            queue.extend(ctx.uow.collect_new_events().into_iter().map(Message::Event));
        }
    }

    async fn dispatch_command(
        &self,
        command: &Command,
        ctx: &mut HandlerContext,
        queue: &mut VecDeque<Message>,
    ) -> Result<(), BusError> {
        let kind = command.kind();
        let Some(handler) = self.registry.command_handler(kind) else {
            tracing::error!(command = command.name(), "no handler for command");
            return Err(BusError::NoCommandHandler(kind));
        };
        metrics::counter!("bus_commands_total", "command" => command.name()).increment(1);

        let start = Instant::now();
        let result = handler.handle(command, ctx).await;
        ctx.uow.exit().await;
        metrics::histogram!("bus_dispatch_duration_seconds", "handler" => handler.name())
            .record(start.elapsed().as_secs_f64());

        let committed = ctx.uow.collect_new_events().into_iter().map(Message::Event);
        match result {
            Ok(()) => {
                tracing::debug!(command = command.name(), "command handled");
                queue.extend(committed);
                Ok(())
            }
            Err(source) => {
                metrics::counter!("bus_handler_failures_total", "handler" => handler.name())
                    .increment(1);
                tracing::error!(command = command.name(), error = %source, "command failed");
                let residual = queue.drain(..).chain(committed).collect();
                Err(BusError::Command {
                    command: command.name(),
                    source,
                    residual,
                })
            }
        }
    }
}
