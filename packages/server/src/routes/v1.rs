use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/uploads", upload_routes(config))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn upload_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    // The body limit only covers the routes registered before it.
    OpenApiRouter::new()
        .routes(routes!(handlers::upload::submit_upload))
        .layer(handlers::upload::upload_body_limit(
            config.storage.max_upload_size,
        ))
        .routes(routes!(handlers::upload::list_history))
        .routes(routes!(handlers::upload::render_report))
}
