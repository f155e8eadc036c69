//! Admin dashboard route handlers.
//!
//! Each report is computed from full product, user and order lists and
//! cached under its own key until the next product or order write.

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use ecom24_core::{Order, Product, User};

use super::{Envelope, ok};
use crate::cache::{CacheKey, read_through};
use crate::db::RepositoryError;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::stats::{self, BarCharts, DashboardStats, LineCharts, PieCharts};
use crate::state::AppState;

/// Create the dashboard routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(dashboard_stats))
        .route("/pie", get(pie_charts))
        .route("/bar", get(bar_charts))
        .route("/line", get(line_charts))
}

#[derive(Debug, Serialize)]
pub struct StatsBody {
    pub stats: DashboardStats,
}

#[derive(Debug, Serialize)]
pub struct ChartsBody<T> {
    pub charts: T,
}

/// Serve a cached report, building it from all records on a miss.
async fn report<T, F>(state: &AppState, key: CacheKey, build: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&[Product], &[User], &[Order]) -> T + Send,
{
    let store = state.store();
    let value = read_through(state.cache(), key, || async move {
        let (products, users, orders) = tokio::try_join!(
            store.list_products(),
            store.list_users(),
            store.list_orders()
        )?;
        Ok::<_, RepositoryError>(build(&products, &users, &orders))
    })
    .await?;
    Ok(value)
}

pub async fn dashboard_stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<StatsBody>>> {
    let stats = report(&state, CacheKey::AdminStats, |products, users, orders| {
        stats::dashboard_stats(Utc::now(), products, users, orders)
    })
    .await?;

    Ok(ok("Dashboard stats fetched successfully", StatsBody { stats }))
}

pub async fn pie_charts(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ChartsBody<PieCharts>>>> {
    let charts = report(&state, CacheKey::AdminPieChart, |products, users, orders| {
        stats::pie_charts(Utc::now(), products, users, orders)
    })
    .await?;

    Ok(ok(
        "Pie-Charts data fetched successfully",
        ChartsBody { charts },
    ))
}

pub async fn bar_charts(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ChartsBody<BarCharts>>>> {
    let charts = report(&state, CacheKey::AdminBarChart, |products, users, orders| {
        stats::bar_charts(Utc::now(), products, users, orders)
    })
    .await?;

    Ok(ok(
        "Bar-Charts data fetched successfully",
        ChartsBody { charts },
    ))
}

pub async fn line_charts(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Envelope<ChartsBody<LineCharts>>>> {
    let charts = report(&state, CacheKey::AdminLineChart, |products, users, orders| {
        stats::line_charts(Utc::now(), products, users, orders)
    })
    .await?;

    Ok(ok(
        "Line-Charts data fetched successfully",
        ChartsBody { charts },
    ))
}
