//! Typed handler table.
//!
//! Handlers are plain functions taking the concrete command or event struct
//! and the [`HandlerContext`]. Registration erases the payload type; dispatch
//! unwraps the [`Command`]/[`Event`] enum back to it.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use domain::{Command, CommandKind, CommandType, Event, EventKind, EventType};
use futures_util::future::BoxFuture;

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};

/// Future returned by every handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), HandlerError>>;

pub trait DynCommandHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle<'a>(
        &'a self,
        command: &'a Command,
        ctx: &'a mut HandlerContext,
    ) -> HandlerFuture<'a>;
}

pub trait DynEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, event: &'a Event, ctx: &'a mut HandlerContext) -> HandlerFuture<'a>;
}

/// Last path segment of a function's type name, without generic arguments.
fn handler_name<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

struct TypedCommandHandler<C, F> {
    handler: F,
    name: &'static str,
    _command: PhantomData<fn(&C)>,
}

impl<C, F> DynCommandHandler for TypedCommandHandler<C, F>
where
    C: CommandType,
    F: for<'a> Fn(&'a C, &'a mut HandlerContext) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(
        &'a self,
        command: &'a Command,
        ctx: &'a mut HandlerContext,
    ) -> HandlerFuture<'a> {
        match C::from_command(command) {
            Some(typed) => (self.handler)(typed, ctx),
            None => Box::pin(async move {
                Err(HandlerError::Mismatch {
                    expected: C::KIND.name(),
                    found: command.name(),
                })
            }),
        }
    }
}

struct TypedEventHandler<E, F> {
    handler: F,
    name: &'static str,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> DynEventHandler for TypedEventHandler<E, F>
where
    E: EventType,
    F: for<'a> Fn(&'a E, &'a mut HandlerContext) -> HandlerFuture<'a> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, event: &'a Event, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
        match E::from_event(event) {
            Some(typed) => (self.handler)(typed, ctx),
            None => Box::pin(async move {
                Err(HandlerError::Mismatch {
                    expected: E::KIND.name(),
                    found: event.name(),
                })
            }),
        }
    }
}

/// Maps each command kind to its one handler and each event kind to its
/// handlers, in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    commands: HashMap<CommandKind, Arc<dyn DynCommandHandler>>,
    events: HashMap<EventKind, Vec<Arc<dyn DynEventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for command `C`. A kind takes exactly one
    /// handler.
    pub fn on_command<C, F>(&mut self, handler: F) -> Result<&mut Self, RegistryError>
    where
        C: CommandType,
        F: for<'a> Fn(&'a C, &'a mut HandlerContext) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        if self.commands.contains_key(&C::KIND) {
            return Err(RegistryError::DuplicateCommandHandler(C::KIND));
        }
        self.commands.insert(
            C::KIND,
            Arc::new(TypedCommandHandler {
                handler,
                name: handler_name::<F>(),
                _command: PhantomData::<fn(&C)>,
            }),
        );
        Ok(self)
    }

    /// Adds a handler for event `E` after the ones already registered.
    pub fn on_event<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: EventType,
        F: for<'a> Fn(&'a E, &'a mut HandlerContext) -> HandlerFuture<'a> + Send + Sync + 'static,
    {
        self.events
            .entry(E::KIND)
            .or_default()
            .push(Arc::new(TypedEventHandler {
                handler,
                name: handler_name::<F>(),
                _event: PhantomData::<fn(&E)>,
            }));
        self
    }

    pub fn command_handler(&self, kind: CommandKind) -> Option<&Arc<dyn DynCommandHandler>> {
        self.commands.get(&kind)
    }

    pub fn event_handlers(&self, kind: EventKind) -> &[Arc<dyn DynEventHandler>] {
        self.events.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Checks that every command kind has a handler.
    pub fn validate(&self) -> Result<(), RegistryError> {
        match CommandKind::ALL
            .iter()
            .find(|kind| !self.commands.contains_key(*kind))
        {
            Some(kind) => Err(RegistryError::MissingCommandHandler(*kind)),
            None => Ok(()),
        }
    }
}
