use crate::{ledger, memory, snapshot};
use axum::Router;
use lmv_kernel::server::{ApiState, system_router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[derive(OpenApi)]
struct ApiDoc;

#[allow(unreachable_pub)]
pub fn init(state: ApiState) -> Router {
    let api = ApiDoc::openapi();

    let (openapi_routes, api_doc) = OpenApiRouter::with_openapi(api)
        .merge(system_router())
        .merge(memory::router())
        .merge(ledger::router())
        .merge(snapshot::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .split_for_parts();

    let scalar_routes = Scalar::with_url("/api", api_doc);

    Router::new().merge(openapi_routes).merge(scalar_routes)
}
