use domain::commands::{CreatePermission, DeletePermission, UpdatePermission};
use domain::events::{PermissionCreated, PermissionDeleted, PermissionUpdated};
use domain::Entity;

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};
use crate::registry::{HandlerFuture, HandlerRegistry};

pub fn create_permission<'a>(
    command: &'a CreatePermission,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        if repo.get_permission(&command.permission).await?.is_some() {
            return Err(HandlerError::already_exists(
                "permission",
                &command.permission,
            ));
        }
        repo.create_permission(&command.permission).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn update_permission<'a>(
    command: &'a UpdatePermission,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let permission = repo
            .get_permission(&command.permission)
            .await?
            .ok_or_else(|| HandlerError::not_found("permission", &command.permission))?;
        permission.update(command.update.clone());
        let id = permission.id();
        repo.update_permission(id, &command.update).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn delete_permission<'a>(
    command: &'a DeletePermission,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let permission = repo
            .get_permission(&command.permission)
            .await?
            .ok_or_else(|| HandlerError::not_found("permission", &command.permission))?;
        permission.delete();
        let id = permission.id();
        repo.delete_permission(id).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_permission_created<'a>(
    event: &'a PermissionCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: Permission Creation\nPermission: {}\n",
            event.permission
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_permission_updated<'a>(
    event: &'a PermissionUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: Permission Update\nPermission: {}\nUpdate: {:?}\n",
            event.permission, event.update
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_permission_deleted<'a>(
    event: &'a PermissionDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: Permission Deletion\nPermission: {}\n",
            event.permission
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn register_commands(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry
        .on_command::<CreatePermission, _>(create_permission)?
        .on_command::<UpdatePermission, _>(update_permission)?
        .on_command::<DeletePermission, _>(delete_permission)?;
    Ok(())
}

pub fn register_notifications(registry: &mut HandlerRegistry) {
    registry
        .on_event::<PermissionCreated, _>(notify_admin_permission_created)
        .on_event::<PermissionUpdated, _>(notify_admin_permission_updated)
        .on_event::<PermissionDeleted, _>(notify_admin_permission_deleted);
}
