//! Account handlers: `register`, `login`, `logout`.

use serde_json::{Map, Value, json};

use {
    parlor_protocol::{Response, actions},
    parlor_store::password,
};

use super::{
    HandlerContext, INFO_UNKNOWN_USERNAME, Route, route, validate_credentials, validate_request,
};

pub fn routes() -> Vec<Route> {
    vec![
        route(actions::REGISTER, register),
        route(actions::LOGIN, login),
        route(actions::LOGOUT, logout),
    ]
}

async fn register(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_credentials(request)
        || request.data_str("repeat_password") != request.data_str("password")
    {
        return Ok(Response::malformed(request.action.clone()));
    }

    let username = request.data_str("username").unwrap_or_default();
    let password = request.data_str("password").unwrap_or_default();

    if ctx.store.user_by_username(username).await?.is_some() {
        return Ok(Response::refused(
            actions::REGISTER,
            "Clientname already exists",
        ));
    }

    ctx.store.create_user(username, password).await?;
    Ok(Response::ok(actions::REGISTER, "Register completed"))
}

async fn login(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_credentials(request) {
        return Ok(Response::malformed(request.action.clone()));
    }

    let username = request.data_str("username").unwrap_or_default();
    let Some(user) = ctx.store.user_by_username(username).await? else {
        return Ok(Response::refused(actions::LOGIN, INFO_UNKNOWN_USERNAME));
    };

    let password = request.data_str("password").unwrap_or_default();
    if !password::verify_password(password, &user.password) {
        return Ok(Response::refused(actions::LOGIN, "Wrong password"));
    }

    ctx.store.set_authenticated(user.id, true).await?;
    if let Some(address) = request.data_str("address") {
        ctx.store.record_login(user.id, address).await?;
    }

    let contacts: Map<String, Value> = ctx
        .store
        .contacts_map(user.id)
        .await?
        .into_iter()
        .map(|(name, id)| (name, Value::from(id)))
        .collect();

    let mut user_data = json!({
        "username": user.username,
        "user_id": user.id,
        "contacts": contacts,
    });
    if let Some(avatar) = ctx.store.avatar_path(user.id).await? {
        user_data["avatar"] = Value::String(avatar);
    }

    // Bind before the response goes out: a fan-out racing this login must
    // already see the session.
    ctx.sessions
        .bind(&ctx.events, &user.username, ctx.conn_id, ctx.sink.clone())
        .await;

    Ok(Response::ok(actions::LOGIN, "Client logged in").with("user_data", user_data))
}

async fn logout(ctx: HandlerContext) -> crate::Result<Response> {
    let request = &ctx.request;
    if !validate_request(request) {
        return Ok(Response::malformed(request.action.clone()));
    }

    let username = request.data_str("username").unwrap_or_default();
    let Some(user) = ctx.store.user_by_username(username).await? else {
        return Ok(Response::refused(actions::LOGOUT, INFO_UNKNOWN_USERNAME));
    };

    ctx.store.set_authenticated(user.id, false).await?;
    ctx.sessions.unbind(&ctx.events, &user.username).await;

    Ok(Response::ok(actions::LOGOUT, "Client logged out")
        .with("username", user.username.clone())
        .with("user_id", user.id))
}
