use axum::{extract::State, response::Json};

use crate::services::catalog::MealResponse;
use crate::{errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/meals",
    summary = "List meals",
    description = "Available menu items ordered by category then name",
    responses(
        (status = 200, description = "Menu retrieved", body = ApiResponse<Vec<MealResponse>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "meals"
)]
pub async fn list_meals(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MealResponse>>>, ServiceError> {
    let meals = state.services.catalog.list_meals().await?;
    Ok(Json(ApiResponse::success(meals)))
}
