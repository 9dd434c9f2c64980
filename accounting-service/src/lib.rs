pub mod config;
pub mod dtos;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod secrets;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AccountingConfig;
use crate::identity::IdentityProvider;
use crate::services::{
    AccountingService, AuthorizationEngine, JwtService, LoginSettings, SessionManager,
    SessionStore,
};
use crate::store::{CredentialStore, StoreHandle};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::session::login,
        handlers::session::logout,
        handlers::session::authenticate,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::users::find_user,
        handlers::users::get_me,
        handlers::users::regenerate_seed,
        handlers::admins::list_admins,
        handlers::admins::add_admin,
        handlers::admins::remove_admin,
        handlers::services::list_services,
        handlers::services::create_service,
        handlers::services::delete_service,
        handlers::groups::list_groups,
        handlers::groups::create_group,
        handlers::groups::update_group,
        handlers::groups::list_members,
        handlers::groups::add_member,
        handlers::groups::remove_member,
        handlers::accounts::list_accounts,
        handlers::accounts::create_account,
        handlers::accounts::update_account,
        handlers::accounts::list_account_users,
        handlers::accounts::add_account_user,
        handlers::accounts::remove_account_user,
        handlers::resources::list_resources,
        handlers::resources::create_resource,
        handlers::resources::update_resource,
        handlers::resources::list_resource_groups,
        handlers::resources::add_resource_group,
        handlers::resources::remove_resource_group,
        handlers::usage::insert_usage,
        handlers::usage::list_usage,
        handlers::ids::group_id,
        handlers::ids::user_id,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::AuthenticateRequest,
            dtos::auth::AuthenticateResponse,
            dtos::users::CreateUserRequest,
            dtos::groups::CreateGroupRequest,
            dtos::groups::UpdateGroupRequest,
            dtos::accounts::CreateAccountRequest,
            dtos::services::CreateServiceRequest,
            dtos::resources::CreateResourceRequest,
            dtos::usage::UsageRecordRequest,
            dtos::usage::UsageBatchRequest,
            dtos::usage::UsageBatchResponse,
            dtos::ids::NumericIdResponse,
            models::SanitizedUser,
            models::UserGroupSummary,
            models::UserWithGroups,
            models::UserProfile,
            models::UserPatch,
            models::Group,
            models::MemberResponse,
            models::Account,
            models::AccountPatch,
            models::AccountMemberResponse,
            models::ServiceSummary,
            models::CreatedService,
            models::Resource,
            models::ResourcePatch,
            models::ResourceUsage,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Login, logout and one-time password checks"),
        (name = "Users", description = "User records and self-service"),
        (name = "Admins", description = "Members of the admins group"),
        (name = "Services", description = "Service principals"),
        (name = "Groups", description = "Groups and memberships"),
        (name = "Accounts", description = "Billing accounts and their users"),
        (name = "Resources", description = "Accounted resources"),
        (name = "Usage", description = "Resource usage records"),
        (name = "Ids", description = "POSIX id lookups"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "token_header",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-token"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccountingConfig,
    pub accounting: AccountingService,
    pub sessions: SessionManager,
    pub login_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wires the session manager, authorization engine and accounting
    /// operations over the given backends.
    pub fn new(
        config: AccountingConfig,
        store: Arc<dyn CredentialStore>,
        session_store: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppError> {
        let store = StoreHandle::new(store, Duration::from_millis(config.request_timeout_ms));
        let jwt = JwtService::new(&config.token).map_err(AppError::ConfigError)?;

        let sessions = SessionManager::new(
            jwt,
            session_store,
            store.clone(),
            provider,
            LoginSettings::from_config(&config),
        );
        let authz = AuthorizationEngine::new(store.clone(), config.admin.proof);
        let accounting = AccountingService::new(store, authz, sessions.clone(), config.ids);

        let login_rate_limiter = create_ip_rate_limiter(
            config.security.login_attempts,
            config.security.login_window_seconds,
        )?;

        Ok(Self {
            config,
            accounting,
            sessions,
            login_rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/login", post(handlers::session::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected = Router::new()
        .route("/logout", post(handlers::session::logout))
        .route("/authenticate", post(handlers::session::authenticate))
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route("/users/me", get(handlers::users::get_me))
        .route("/users/me/seed", post(handlers::users::regenerate_seed))
        .route("/users/find/:dom_name", get(handlers::users::find_user))
        // one segment addresses users by id for reads and patches, by
        // dom_name for deletes
        .route(
            "/users/:user",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/admins", get(handlers::admins::list_admins))
        .route(
            "/admins/:dom_name",
            post(handlers::admins::add_admin).delete(handlers::admins::remove_admin),
        )
        .route(
            "/services",
            get(handlers::services::list_services).post(handlers::services::create_service),
        )
        .route(
            "/services/:name",
            axum::routing::delete(handlers::services::delete_service),
        )
        .route(
            "/groups",
            get(handlers::groups::list_groups).post(handlers::groups::create_group),
        )
        .route(
            "/groups/:group",
            axum::routing::patch(handlers::groups::update_group),
        )
        .route("/groups/:group/members", get(handlers::groups::list_members))
        .route(
            "/groups/:group/members/:dom_name",
            put(handlers::groups::add_member).delete(handlers::groups::remove_member),
        )
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::create_account),
        )
        .route(
            "/accounts/:id",
            axum::routing::patch(handlers::accounts::update_account),
        )
        .route("/accounts/:id/users", get(handlers::accounts::list_account_users))
        .route(
            "/accounts/:id/users/:dom_name",
            put(handlers::accounts::add_account_user)
                .delete(handlers::accounts::remove_account_user),
        )
        .route(
            "/resources",
            get(handlers::resources::list_resources).post(handlers::resources::create_resource),
        )
        .route(
            "/resources/:id",
            axum::routing::patch(handlers::resources::update_resource),
        )
        .route(
            "/resources/:id/groups",
            get(handlers::resources::list_resource_groups),
        )
        .route(
            "/resources/:id/groups/:group",
            put(handlers::resources::add_resource_group)
                .delete(handlers::resources::remove_resource_group),
        )
        .route(
            "/usage",
            get(handlers::usage::list_usage).post(handlers::usage::insert_usage),
        )
        .route("/ids/group/:name", get(handlers::ids::group_id))
        .route("/ids/user/:logon_name", get(handlers::ids::user_id))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .nest("/api/v1", login_route.merge(protected));

    if state.config.security.enable_swagger {
        app = app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::auth::TOKEN_HEADER),
            HeaderName::from_static(service_core::middleware::tracing::REQUEST_ID_HEADER),
        ]);

    app.with_state(state)
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::tracing::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}
