use axum::{
    Router,
    routing::{get, post, put},
};

pub mod auth;
pub mod roles;
pub mod services;
pub mod system;
pub mod users;

/// Endpoints reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/validate", post(auth::validate))
}

/// Endpoints behind the authorization gateway.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/roles", post(users::assign_roles))
        .route("/users/:id", put(users::update_user).delete(users::delete_user))
        .route("/users/:id/permissions", get(users::user_permissions))
        .route("/auth/roles", get(roles::list_roles).post(roles::create_role))
        .route("/auth/services", get(services::list_services).post(services::create_service))
        .route("/auth/services/permissions", post(services::create_service_permission))
        .route("/auth/services/:id/permissions", get(services::service_permissions))
}
