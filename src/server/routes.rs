use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use http::StatusCode;

use crate::authorization::{require_scope, ScopeGuard};
use crate::directory::models::{AttributeQuery, ListQuery, ListResponse, User};
use crate::errors::AuthxResult;
use crate::server::dto::{
    ActivateRequest, ChangePasswordRequest, Envelope, ForgotPasswordRequest, ModifyUserRequest,
    RegisterRequest, ResendActivationRequest, ResetPasswordRequest,
};
use crate::server::server::AppState;

type Body<T> = Result<Json<T>, JsonRejection>;

/// `/users` API. Admin-only methods and default-scope methods share paths,
/// so guards are attached per method router.
pub fn router(state: &AppState) -> Router<AppState> {
    let user_guard = from_fn_with_state(ScopeGuard::default_scope(state.gate.clone()), require_scope);
    let admin_guard = from_fn_with_state(
        ScopeGuard::scope(state.gate.clone(), &state.admin_scope),
        require_scope,
    );

    Router::new()
        .route(
            "/users",
            post(register).merge(get(list_users).route_layer(admin_guard.clone())),
        )
        .route("/users/activate", post(activate))
        .route("/users/resendActivation", post(resend_activation))
        .route("/users/forgotPassword", post(forgot_password))
        .route("/users/resetPassword", post(reset_password))
        .route(
            "/users/{id}",
            get(get_user)
                .patch(modify_user)
                .route_layer(user_guard.clone())
                .merge(delete(delete_user).route_layer(admin_guard)),
        )
        .route("/users/{id}/password", post(change_password).route_layer(user_guard))
}

async fn register(
    State(state): State<AppState>,
    body: Body<RegisterRequest>,
) -> AuthxResult<(StatusCode, Json<Envelope<User>>)> {
    let Json(request) = body?;
    let registration = state
        .services
        .registration
        .register(
            &request.user.email,
            &request.user.password,
            request.activation_url.as_deref(),
        )
        .await?;
    // the link reaches the user through the notification sinks only
    Ok((StatusCode::CREATED, Json(Envelope::data(registration.user))))
}

async fn activate(
    State(state): State<AppState>,
    body: Body<ActivateRequest>,
) -> AuthxResult<Json<Envelope<User>>> {
    let Json(request) = body?;
    let user = state
        .services
        .activation
        .activate(&request.activation_token)
        .await?;
    Ok(Json(Envelope::data(user)))
}

async fn resend_activation(
    State(state): State<AppState>,
    body: Body<ResendActivationRequest>,
) -> AuthxResult<Json<Envelope<()>>> {
    let Json(request) = body?;
    state
        .services
        .registration
        .resend_activation(&request.user_name, request.activation_url.as_deref())
        .await?;
    Ok(Json(Envelope::ack()))
}

async fn forgot_password(
    State(state): State<AppState>,
    body: Body<ForgotPasswordRequest>,
) -> AuthxResult<Json<Envelope<()>>> {
    let Json(request) = body?;
    state
        .services
        .password
        .forgot_password(&request.user_name, request.reset_url.as_deref())
        .await?;
    Ok(Json(Envelope::ack()))
}

async fn reset_password(
    State(state): State<AppState>,
    body: Body<ResetPasswordRequest>,
) -> AuthxResult<Json<Envelope<()>>> {
    let Json(request) = body?;
    state
        .services
        .password
        .reset_password(&request.reset_password_token, &request.new_password)
        .await?;
    Ok(Json(Envelope::ack()))
}

async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body<ChangePasswordRequest>,
) -> AuthxResult<Json<Envelope<User>>> {
    let Json(request) = body?;
    let user = state
        .services
        .password
        .change_password(&id, &request.user_name, &request.old_password, &request.new_password)
        .await?;
    Ok(Json(Envelope::data(user)))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AuthxResult<Json<Envelope<ListResponse>>> {
    let users = state.services.users.list_users(&query).await?;
    Ok(Json(Envelope::data(users)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AttributeQuery>,
) -> AuthxResult<Json<Envelope<User>>> {
    let user = state.services.users.get_user(&id, &query).await?;
    Ok(Json(Envelope::data(user)))
}

async fn modify_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body<ModifyUserRequest>,
) -> AuthxResult<Json<Envelope<User>>> {
    let Json(request) = body?;
    let user = state.services.users.modify_user(&id, &request.user).await?;
    Ok(Json(Envelope::data(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AuthxResult<StatusCode> {
    state.services.users.delete_user(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
