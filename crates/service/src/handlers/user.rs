use domain::commands::{CreateUser, DeleteUser, UpdateUser};
use domain::events::{UserCreated, UserDeleted, UserUpdated};
use domain::{Entity, UserLookup};

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};
use crate::registry::{HandlerFuture, HandlerRegistry};

/// Registers a user. Both the username and the email must be free.
pub fn create_user<'a>(command: &'a CreateUser, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        if repo
            .get_user(&UserLookup::by_username(&command.username))
            .await?
            .is_some()
        {
            return Err(HandlerError::already_exists("user", &command.username));
        }
        if repo
            .get_user(&UserLookup::by_email(&command.email))
            .await?
            .is_some()
        {
            return Err(HandlerError::already_exists("user", &command.email));
        }
        repo.create_user(
            &command.username,
            command.password.clone(),
            &command.email,
            command.roles.clone(),
        )
        .await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn update_user<'a>(command: &'a UpdateUser, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let user = repo
            .get_user(&command.lookup)
            .await?
            .ok_or_else(|| HandlerError::not_found("user", &command.lookup))?;
        user.update(command.update.clone());
        let id = user.id();
        repo.update_user(id, &command.update).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

/// Deletes a user. Its API keys go with it.
pub fn delete_user<'a>(command: &'a DeleteUser, ctx: &'a mut HandlerContext) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let user = repo
            .get_user(&command.lookup)
            .await?
            .ok_or_else(|| HandlerError::not_found("user", &command.lookup))?;
        user.delete();
        let id = user.id();
        repo.delete_user(id).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn user_created_notification<'a>(
    event: &'a UserCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Account Creation Confirmation\nWelcome, {}!\n",
            event.username
        );
        ctx.notifier.notify(&event.email, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn user_updated_notification<'a>(
    event: &'a UserUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let destination = event.new_email.as_deref().unwrap_or(&event.email);
        let message = format!("Account Update Confirmation\nUser: {}\n", event.username);
        ctx.notifier.notify(destination, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn user_deleted_notification<'a>(
    event: &'a UserDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!("Account Deletion Confirmation\nUser: {}\n", event.username);
        ctx.notifier.notify(&event.email, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_user_created<'a>(
    event: &'a UserCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: User Creation\nUser: {}\nE-Mail: {}\nRoles: {}\n",
            event.username,
            event.email,
            event.roles.join(", ")
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_user_updated<'a>(
    event: &'a UserUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let mut message = format!(
            "Event: User Update\nUser: {}\nE-Mail: {}\n",
            event.username, event.email
        );
        if let Some(ref username) = event.new_username {
            message.push_str(&format!("New User: {username}\n"));
        }
        if let Some(ref email) = event.new_email {
            message.push_str(&format!("New E-Mail: {email}\n"));
        }
        if let Some(ref roles) = event.roles {
            message.push_str(&format!("Roles: {}\n", roles.join(", ")));
        }
        if event.password_changed {
            message.push_str("Password changed\n");
        }
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_user_deleted<'a>(
    event: &'a UserDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: User Deletion\nUser: {}\nE-Mail: {}\n",
            event.username, event.email
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn register_commands(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry
        .on_command::<CreateUser, _>(create_user)?
        .on_command::<UpdateUser, _>(update_user)?
        .on_command::<DeleteUser, _>(delete_user)?;
    Ok(())
}

/// Owner notice first, then the administrator's.
pub fn register_notifications(registry: &mut HandlerRegistry) {
    registry
        .on_event::<UserCreated, _>(user_created_notification)
        .on_event::<UserCreated, _>(notify_admin_user_created)
        .on_event::<UserUpdated, _>(user_updated_notification)
        .on_event::<UserUpdated, _>(notify_admin_user_updated)
        .on_event::<UserDeleted, _>(user_deleted_notification)
        .on_event::<UserDeleted, _>(notify_admin_user_deleted);
}
