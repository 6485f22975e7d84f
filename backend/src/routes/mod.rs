//! Route definitions for the POS inventory engine

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - goods receipts
        .nest("/grns", grn_routes(state.clone()))
        // Protected routes - stock reports
        .nest("/inventoryReports", report_routes(state.clone()))
        // Protected routes - stock ledger
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - movements posted by sibling engines
        .nest("/stock-movements", movement_routes(state))
}

/// Goods receipt routes (protected)
fn grn_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_grns).post(handlers::create_grn))
        .route("/search", get(handlers::search_grns))
        .route("/company/:company_id", get(handlers::list_company_grns))
        .route("/shop/:company_id/:shop_id", get(handlers::list_shop_grns))
        .route(
            "/supplier/:company_id/:shop_id/:supplier_id",
            get(handlers::list_supplier_grns),
        )
        .route("/view/:company_id/:shop_id/:code", get(handlers::get_grn))
        .route(
            "/details/:company_id/:shop_id/:code",
            get(handlers::get_grn_details),
        )
        .route(
            "/cancel/:code/:company_id/:shop_id",
            post(handlers::cancel_grn),
        )
        .route(
            "/settle/:code/:company_id/:shop_id",
            post(handlers::settle_grn),
        )
        .route(
            "/update/:code/:company_id/:shop_id",
            put(handlers::update_grn),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock report routes (protected)
fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/report", get(handlers::get_stock_report))
        .route("/daily-report", get(handlers::get_daily_report))
        .route("/weekly-report", get(handlers::get_weekly_report))
        .route("/monthly-report", get(handlers::get_monthly_report))
        .route("/low-stock", get(handlers::get_low_stock))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock ledger routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:company_id/:shop_id", get(handlers::list_ledger_entries))
        .route(
            "/:company_id/:shop_id/:category_id/:product_id",
            get(handlers::get_ledger_entry),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock movement routes (protected)
fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::post_stock_movement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
