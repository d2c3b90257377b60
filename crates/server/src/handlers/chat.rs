//! Chat handlers: contacts, chats, messages, profiles, search.

use serde_json::{Value, json};

use {
    parlor_protocol::{Response, actions},
    parlor_store::{Error as StoreError, User},
};

use super::{
    HandlerContext, INFO_UNKNOWN_USERNAME, Route, is_truthy, messages_to_value, route,
    validate_request,
};

const INFO_UNKNOWN_CONTACT: &str = "Contact does not exist in database";
const INFO_UNKNOWN_CHAT: &str = "Chat does not exist in database";
const INFO_PROFILE: &str = "Profile data were retrieved from database";

pub fn routes() -> Vec<Route> {
    vec![
        route(actions::GET_CONTACTS, get_contacts),
        route(actions::ADD_CONTACT, add_contact),
        route(actions::DELETE_CONTACT, delete_contact),
        route(actions::GET_CHAT, get_chat),
        route(actions::COMMON_CHAT, common_chat),
        route(actions::ADD_MESSAGE, add_message),
        route(actions::PROFILE, profile),
        route(actions::UPDATE_PROFILE, update_profile),
        route(actions::SEARCH_IN_CHAT, search_in_chat),
    ]
}

/// Caller lookup shared by every handler here; `Err(refusal)` is the
/// ready-made 205.
async fn caller(ctx: &HandlerContext, action: &str) -> crate::Result<Result<User, Response>> {
    let username = ctx.request.data_str("username").unwrap_or_default();
    match ctx.store.user_by_username(username).await? {
        Some(user) => Ok(Ok(user)),
        None => Ok(Err(Response::refused(action, INFO_UNKNOWN_USERNAME))),
    }
}

async fn get_contacts(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let user = match caller(&ctx, actions::GET_CONTACTS).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    let contacts = ctx.store.contacts_map(user.id).await?;
    let info = if contacts.is_empty() {
        "Your contacts list is empty"
    } else {
        "Contacts were retrieved from database"
    };
    let mut map = serde_json::Map::new();
    for (name, id) in contacts {
        map.insert(name, Value::from(id));
    }
    Ok(Response::ok(actions::GET_CONTACTS, info).with("contacts", Value::Object(map)))
}

async fn add_contact(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let Some(contact_name) = request.data_str("contact") else {
        return Ok(Response::malformed(request.action.clone()));
    };
    let user = match caller(&ctx, actions::ADD_CONTACT).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    if contact_name == user.username {
        return Ok(Response::refused(
            actions::ADD_CONTACT,
            "You are always in your own contact list",
        ));
    }
    let Some(contact) = ctx.store.user_by_username(contact_name).await? else {
        return Ok(Response::refused(actions::ADD_CONTACT, INFO_UNKNOWN_CONTACT));
    };
    if ctx.store.has_contact(user.id, contact.id).await? {
        return Ok(Response::refused(
            actions::ADD_CONTACT,
            "User already in your contact list.",
        ));
    }

    ctx.store.add_contact(user.id, contact.id).await?;
    let mut new_contact = serde_json::Map::new();
    new_contact.insert(contact.username, Value::from(contact.id));
    Ok(
        Response::ok(actions::ADD_CONTACT, "User was added to your contact list")
            .with("new_contact", Value::Object(new_contact)),
    )
}

async fn delete_contact(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let Some(contact_id) = request.data_i64("contact_id") else {
        return Ok(Response::malformed(request.action.clone()));
    };
    let user = match caller(&ctx, actions::DELETE_CONTACT).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    // Removing an absent contact succeeds too; the id may be the contact
    // user id or a legacy relation id.
    ctx.store.delete_contact(user.id, contact_id).await?;

    let contact = request.data.get("contact").cloned().unwrap_or(Value::Null);
    Ok(Response::ok(actions::DELETE_CONTACT, "Contact has been deleted.").with("contact", contact))
}

async fn get_chat(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let (Some(user_id), Some(contact_id)) =
        (request.data_i64("user_id"), request.data_i64("contact_id"))
    else {
        return Ok(Response::malformed(request.action.clone()));
    };

    if ctx.store.user_by_id(user_id).await?.is_none() {
        return Ok(Response::refused(actions::GET_CHAT, INFO_UNKNOWN_USERNAME));
    }
    let Some(contact) = ctx.store.user_by_id(contact_id).await? else {
        return Ok(Response::refused(actions::GET_CHAT, INFO_UNKNOWN_CONTACT));
    };

    let chat_id = ctx.store.single_chat_between(user_id, contact.id).await?;
    let messages = ctx.store.chat_messages(chat_id).await?;

    let mut response = Response::ok(actions::GET_CHAT, "Ok")
        .with("chat_id", chat_id)
        .with("contact_user_id", contact.id)
        .with("contact_username", contact.username)
        .with("lenght", messages.len());
    if !messages.is_empty() {
        response = response.with("messages", messages_to_value(&messages));
    }
    Ok(response)
}

async fn common_chat(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let user = match caller(&ctx, actions::COMMON_CHAT).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    let chat_id = ctx.store.common_chat().await?;
    ctx.store.ensure_participant(chat_id, user.id).await?;
    let messages = ctx.store.chat_messages(chat_id).await?;

    let mut response = Response::ok(actions::COMMON_CHAT, "Ok").with("chat_id", chat_id);
    if !messages.is_empty() {
        response = response.with("messages", messages_to_value(&messages));
    }
    Ok(response)
}

async fn add_message(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let (Some(user_id), Some(chat_id), Some(text)) = (
        request.data_i64("user_id"),
        request.data_i64("chat_id"),
        request.data.get("message").and_then(Value::as_str),
    ) else {
        return Ok(Response::malformed(request.action.clone()));
    };

    let Some(sender) = ctx.store.user_by_id(user_id).await? else {
        return Ok(Response::refused(actions::ADD_MESSAGE, INFO_UNKNOWN_USERNAME));
    };

    let message = match ctx.store.add_message(sender.id, chat_id, text).await {
        Ok(message) => message,
        Err(StoreError::EmptyMessage) => {
            return Ok(Response::refused(actions::ADD_MESSAGE, "Message text is empty"));
        },
        Err(StoreError::UnknownChat { .. }) => {
            return Ok(Response::refused(actions::ADD_MESSAGE, INFO_UNKNOWN_CHAT));
        },
        Err(StoreError::NotAParticipant { .. }) => {
            return Ok(Response::refused(
                actions::ADD_MESSAGE,
                "Sender is not a participant of this chat",
            ));
        },
        Err(e) => return Err(e.into()),
    };

    let contact_username = request
        .data
        .get("contact_username")
        .cloned()
        .unwrap_or(Value::Null);
    Ok(
        Response::ok(actions::ADD_MESSAGE, "Message has been added to database")
            .with("chat_id", message.chat_id)
            .with("contact_username", contact_username)
            .with("message", json!([sender.username, message.text])),
    )
}

async fn profile(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let user = match caller(&ctx, actions::PROFILE).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    let mut user_data = json!({
        "first_name": user.first_name,
        "second_name": user.second_name,
        "bio": user.bio,
    });
    if let Some(avatar) = ctx.store.avatar_path(user.id).await? {
        user_data["file_name"] = Value::String(avatar);
    }

    Ok(Response::ok(actions::PROFILE, INFO_PROFILE).with("user_data", user_data))
}

async fn update_profile(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let user = match caller(&ctx, actions::UPDATE_PROFILE).await? {
        Ok(user) => user,
        Err(refusal) => return Ok(refusal),
    };

    if request.data.get("upload_status").is_some_and(is_truthy) {
        ctx.store.set_avatar(user.id, &user.username).await?;
    }

    ctx.store
        .update_profile(
            user.id,
            request.data_str("first_name"),
            request.data_str("second_name"),
            request.data_str("bio"),
        )
        .await?;

    let Some(updated) = ctx.store.user_by_id(user.id).await? else {
        return Ok(Response::refused(actions::UPDATE_PROFILE, INFO_UNKNOWN_USERNAME));
    };
    let mut user_data = json!({
        "first_name": updated.first_name,
        "second_name": updated.second_name,
        "bio": updated.bio,
    });
    if let Some(avatar) = ctx.store.avatar_path(updated.id).await? {
        user_data["file_name"] = Value::String(avatar);
    }

    Ok(Response::ok(actions::UPDATE_PROFILE, INFO_PROFILE).with("user_data", user_data))
}

async fn search_in_chat(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }
    let (Some(chat_id), Some(word)) = (request.data_i64("chat_id"), request.data_str("word"))
    else {
        return Ok(Response::malformed(request.action.clone()));
    };
    if let Err(refusal) = caller(&ctx, actions::SEARCH_IN_CHAT).await? {
        return Ok(refusal);
    }
    if ctx.store.chat_by_id(chat_id).await?.is_none() {
        return Ok(Response::refused(actions::SEARCH_IN_CHAT, INFO_UNKNOWN_CHAT));
    }

    let hits = ctx.store.search_messages(chat_id, word).await?;
    let info = if hits.is_empty() {
        "Found zero messages"
    } else {
        "Messages were retrieved from database"
    };
    Ok(Response::ok(actions::SEARCH_IN_CHAT, info).with("messages", messages_to_value(&hits)))
}
