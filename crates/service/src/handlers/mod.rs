//! Command and event handlers, and read-side query helpers.
//!
//! Command handlers open a scope, guard, mutate and commit. They never
//! publish: committed events reach the broker through [`publish_event`],
//! which runs as an ordinary event handler.

pub mod api_key;
pub mod permission;
pub mod queries;
pub mod role;
pub mod user;

use domain::events::{
    ApiKeyCreated, ApiKeyDeleted, ApiKeyUpdated, PermissionCreated, PermissionDeleted,
    PermissionUpdated, RoleCreated, RoleDeleted, RoleUpdated, UserCreated, UserDeleted,
    UserUpdated,
};
use domain::{Event, EventType};

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};
use crate::registry::{HandlerFuture, HandlerRegistry};

/// Publishes a committed event on its channel.
pub fn publish_event<'a, E: EventType>(
    event: &'a E,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let event: Event = event.clone().into();
        ctx.broker.publish(E::KIND.channel(), &event).await?;
        Ok::<(), HandlerError>(())
    })
}

/// Registers the handler of every command kind.
pub fn register_commands(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    permission::register_commands(registry)?;
    role::register_commands(registry)?;
    user::register_commands(registry)?;
    api_key::register_commands(registry)?;
    Ok(())
}

/// Registers administrator and owner notices for every event kind.
pub fn register_notifications(registry: &mut HandlerRegistry) {
    permission::register_notifications(registry);
    role::register_notifications(registry);
    user::register_notifications(registry);
    api_key::register_notifications(registry);
}

/// Registers broker publication for every event kind.
pub fn register_publication(registry: &mut HandlerRegistry) {
    registry
        .on_event::<PermissionCreated, _>(publish_event::<PermissionCreated>)
        .on_event::<PermissionUpdated, _>(publish_event::<PermissionUpdated>)
        .on_event::<PermissionDeleted, _>(publish_event::<PermissionDeleted>)
        .on_event::<RoleCreated, _>(publish_event::<RoleCreated>)
        .on_event::<RoleUpdated, _>(publish_event::<RoleUpdated>)
        .on_event::<RoleDeleted, _>(publish_event::<RoleDeleted>)
        .on_event::<UserCreated, _>(publish_event::<UserCreated>)
        .on_event::<UserUpdated, _>(publish_event::<UserUpdated>)
        .on_event::<UserDeleted, _>(publish_event::<UserDeleted>)
        .on_event::<ApiKeyCreated, _>(publish_event::<ApiKeyCreated>)
        .on_event::<ApiKeyUpdated, _>(publish_event::<ApiKeyUpdated>)
        .on_event::<ApiKeyDeleted, _>(publish_event::<ApiKeyDeleted>);
}
