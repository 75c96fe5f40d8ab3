use domain::commands::{CreateApiKey, DeleteApiKey, UpdateApiKey};
use domain::events::{ApiKeyCreated, ApiKeyDeleted, ApiKeyUpdated};
use domain::Entity;
use identity_store::ApiKeyQuery;

use crate::context::HandlerContext;
use crate::error::{HandlerError, RegistryError};
use crate::registry::{HandlerFuture, HandlerRegistry};

use super::queries;

/// Issues the user's API key. A user holds at most one.
pub fn create_api_key<'a>(
    command: &'a CreateApiKey,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let owner = repo
            .get_user(&command.user)
            .await?
            .ok_or_else(|| HandlerError::not_found("user", &command.user))?
            .clone();
        if !repo
            .query_api_keys(&ApiKeyQuery::for_user(owner.id()))
            .await?
            .is_empty()
        {
            return Err(HandlerError::already_exists("api_key", owner.username()));
        }
        repo.create_api_key(&owner).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn update_api_key<'a>(
    command: &'a UpdateApiKey,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let api_key = repo
            .get_api_key(command.key)
            .await?
            .ok_or_else(|| HandlerError::not_found("api_key", command.key))?;
        api_key.update(command.update.clone());
        let id = api_key.id();
        repo.update_api_key(id, &command.update).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn delete_api_key<'a>(
    command: &'a DeleteApiKey,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let repo = ctx.uow.enter().await?;
        let user_id = repo
            .get_api_key(command.key)
            .await?
            .ok_or_else(|| HandlerError::not_found("api_key", command.key))?
            .user_id();
        let owner = repo
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("user", user_id))?
            .clone();
        let api_key = repo
            .get_api_key(command.key)
            .await?
            .ok_or_else(|| HandlerError::not_found("api_key", command.key))?;
        api_key.revoke(&owner);
        let id = api_key.id();
        repo.delete_api_key(id).await?;
        ctx.uow.commit().await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn api_key_created_notification<'a>(
    event: &'a ApiKeyCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.notifier
            .notify(&event.email, "API Key Creation Confirmation\n")
            .await?;
        Ok::<(), HandlerError>(())
    })
}

/// Looks the owner up through the key, following a rotation if there was one.
pub fn api_key_updated_notification<'a>(
    event: &'a ApiKeyUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let key = event.update.new_key.unwrap_or(event.key);
        let api_key = queries::get_api_key(&mut ctx.uow, key)
            .await?
            .ok_or_else(|| HandlerError::not_found("api_key", key))?;
        let owner = queries::get_user_by_id(&mut ctx.uow, api_key.user_id())
            .await?
            .ok_or_else(|| HandlerError::not_found("user", api_key.user_id()))?;
        ctx.notifier
            .notify(owner.email(), "API Key Update Confirmation\n")
            .await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn api_key_deleted_notification<'a>(
    event: &'a ApiKeyDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        ctx.notifier
            .notify(&event.email, "API Key Deletion Confirmation\n")
            .await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_api_key_created<'a>(
    event: &'a ApiKeyCreated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: API Key Creation\nUser: {}\nE-Mail: {}\nAPI Key: {}\n",
            event.username, event.email, event.key
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_api_key_updated<'a>(
    event: &'a ApiKeyUpdated,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: API Key Update\nAPI Key: {}\nUpdate: {:?}\n",
            event.key, event.update
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn notify_admin_api_key_deleted<'a>(
    event: &'a ApiKeyDeleted,
    ctx: &'a mut HandlerContext,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let message = format!(
            "Event: API Key Deletion\nAPI Key: {}\nUser: {}\nE-Mail: {}\n",
            event.key, event.username, event.email
        );
        ctx.notifier.notify(&ctx.admin_address, &message).await?;
        Ok::<(), HandlerError>(())
    })
}

pub fn register_commands(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry
        .on_command::<CreateApiKey, _>(create_api_key)?
        .on_command::<UpdateApiKey, _>(update_api_key)?
        .on_command::<DeleteApiKey, _>(delete_api_key)?;
    Ok(())
}

pub fn register_notifications(registry: &mut HandlerRegistry) {
    registry
        .on_event::<ApiKeyCreated, _>(api_key_created_notification)
        .on_event::<ApiKeyCreated, _>(notify_admin_api_key_created)
        .on_event::<ApiKeyUpdated, _>(api_key_updated_notification)
        .on_event::<ApiKeyUpdated, _>(notify_admin_api_key_updated)
        .on_event::<ApiKeyDeleted, _>(api_key_deleted_notification)
        .on_event::<ApiKeyDeleted, _>(notify_admin_api_key_deleted);
}
