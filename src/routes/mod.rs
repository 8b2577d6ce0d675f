use axum::http::HeaderValue;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod parties;
pub mod politicians;
pub mod profiles;
pub mod reports;
pub mod statements;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let statements_routes = Router::new()
        .route(
            "/",
            get(statements::list_statements).post(statements::create_statement),
        )
        .route(
            "/:id",
            get(statements::get_statement)
                .patch(statements::update_statement)
                .delete(statements::delete_statement),
        );

    let politicians_routes = Router::new()
        .route(
            "/",
            get(politicians::list_politicians).post(politicians::create_politician),
        )
        .route(
            "/:id",
            get(politicians::get_politician)
                .patch(politicians::update_politician)
                .delete(politicians::delete_politician),
        )
        .route(
            "/:id/statements",
            get(statements::list_statements_for_politician),
        );

    let parties_routes = Router::new()
        .route("/", get(parties::list_parties).post(parties::create_party))
        .route(
            "/:id",
            get(parties::get_party)
                .patch(parties::update_party)
                .delete(parties::delete_party),
        );

    let profiles_routes = Router::new()
        .route(
            "/me",
            get(profiles::get_own_profile).patch(profiles::update_own_profile),
        )
        .route("/:id", patch(profiles::update_profile));

    let reports_routes = Router::new().route(
        "/",
        get(reports::list_reports).post(reports::create_report),
    );

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/statements", statements_routes)
        .nest("/api/politicians", politicians_routes)
        .nest("/api/parties", parties_routes)
        .nest("/api/profiles", profiles_routes)
        .nest("/api/reports", reports_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
