use domain::commands::{CreateRole, DeleteRole, UpdateRole};
use domain::events::{RoleCreated, RoleDeleted, RoleUpdated};
use domain::Entity;

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};
use crate::registry::{HandlerFuture, HandlerRegistry};

pub fn create_role<'a>(command: &'a CreateRole, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        if repo.get_role(&command.role).await?.is_some() {
            return Err(HandlerError::already_exists("role", &command.role));
        }
        repo.create_role(&command.role, command.permissions.clone())
            .await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn update_role<'a>(command: &'a UpdateRole, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let role = repo
            .get_role(&command.role)
            .await?
            .ok_or_else(|| HandlerError::not_found("role", &command.role))?;
        role.update(command.update.clone());
        let id = role.id();
        repo.update_role(id, &command.update).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn delete_role<'a>(command: &'a DeleteRole, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let role = repo
            .get_role(&command.role)
            .await?
            .ok_or_else(|| HandlerError::not_found("role", &command.role))?;
        role.delete();
        let id = role.id();
        repo.delete_role(id).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_role_created<'a>(
    event: &'a RoleCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: Role Creation\nRole: {}\nPermissions: {}\n",
            event.role,
            event.permissions.join(", ")
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_role_updated<'a>(
    event: &'a RoleUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: Role Update\nRole: {}\nUpdate: {:?}\n",
            event.role, event.update
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_role_deleted<'a>(
    event: &'a RoleDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!("Event: Role Deletion\nRole: {}\n", event.role);
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn register_commands(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry
        .on_command::<CreateRole, _>(create_role)?
        .on_command::<UpdateRole, _>(update_role)?
        .on_command::<DeleteRole, _>(delete_role)?;
    Ok(())
}

pub fn register_notifications(registry: &mut HandlerRegistry) {
    registry
        .on_event::<RoleCreated, _>(notify_admin_role_created)
        .on_event::<RoleUpdated, _>(notify_admin_role_updated)
        .on_event::<RoleDeleted, _>(notify_admin_role_deleted);
}
