pub mod health;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::auth::{handle_login, handle_logout, require_admin};
use crate::content::handlers::{
    handle_admin_list, handle_create, handle_delete, handle_interactions, handle_public_list,
    handle_update, handle_upload_image,
};
use crate::content::{ContentType, Posts, Professionals, Services};
use crate::dashboard::handlers::{
    handle_dashboard, handle_dashboard_stream, handle_live, handle_overview, handle_set_window,
    handle_windows,
};
use crate::events::handlers::handle_record_event;
use crate::realtime::handle_change_stream;
use crate::state::AppState;
use crate::tracking::handlers::{handle_site_flags, handle_track_event, handle_track_pageview};

fn content_routes<C: ContentType>(segment: &str) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/api/v1/admin/{segment}"),
            get(handle_admin_list::<C>).post(handle_create::<C>),
        )
        .route(
            &format!("/api/v1/admin/{segment}/:id"),
            put(handle_update::<C>).delete(handle_delete::<C>),
        )
        .route(
            &format!("/api/v1/admin/{segment}/:id/interactions"),
            get(handle_interactions::<C>),
        )
        .route(
            &format!("/api/v1/admin/{segment}/images"),
            post(handle_upload_image::<C>),
        )
}

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/v1/admin/overview", get(handle_overview))
        .route("/api/v1/admin/dashboard", get(handle_dashboard))
        .route("/api/v1/admin/dashboard/live", get(handle_live))
        .route("/api/v1/admin/dashboard/window", put(handle_set_window))
        .route("/api/v1/admin/dashboard/windows", get(handle_windows))
        .route("/api/v1/admin/dashboard/stream", get(handle_dashboard_stream))
        .route("/api/v1/admin/changes", get(handle_change_stream))
        .merge(content_routes::<Professionals>("professionals"))
        .merge(content_routes::<Services>("services"))
        .merge(content_routes::<Posts>("posts"))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health::health_handler))
        // Public site
        .route(
            "/api/v1/public/professionals",
            get(handle_public_list::<Professionals>),
        )
        .route("/api/v1/public/services", get(handle_public_list::<Services>))
        .route("/api/v1/public/posts", get(handle_public_list::<Posts>))
        .route("/api/v1/events", post(handle_record_event))
        .route("/api/v1/track/pageview", post(handle_track_pageview))
        .route("/api/v1/track/event", post(handle_track_event))
        .route("/api/v1/site/flags", get(handle_site_flags))
        // Admin session
        .route("/api/v1/admin/login", post(handle_login))
        .route("/api/v1/admin/logout", post(handle_logout))
        .merge(admin)
        .with_state(state)
}
