use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;

use super::parse_body;
use crate::directory::DirectoryQuery;
use crate::models::{User, UserFilter, UserV1Params, UserV3, UserV3Params, UsersBody};
use crate::AppState;

pub async fn users_v1(
    State(state): State<AppState>,
    Query(params): Query<UserV1Params>,
    body: Bytes,
) -> Result<Json<Vec<User>>, AppError> {
    let body: UsersBody = parse_body(&body, "failed to parse request body")?;
    let query = params.into_query().map_err(AppError::BadRequest)?;

    let users = state
        .directory
        .execute(DirectoryQuery::ListUsers {
            usernames: body.users,
            query,
        })
        .await?;

    Ok(Json(users))
}

pub async fn accounts_v3_users(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(params): Query<UserV3Params>,
) -> Result<Json<Vec<UserV3>>, AppError> {
    let query = params.into_query().map_err(AppError::BadRequest)?;

    let users = state
        .directory
        .execute(DirectoryQuery::FindUsers {
            org_id,
            filter: UserFilter::default(),
            query,
        })
        .await?;

    Ok(Json(users.into_iter().map(UserV3::from).collect()))
}

pub async fn accounts_v3_users_by(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(params): Query<UserV3Params>,
    body: Bytes,
) -> Result<Json<Vec<UserV3>>, AppError> {
    let filter: UserFilter = parse_body(&body, "failed to parse request body")?;
    if filter.is_empty() {
        return Err(AppError::BadRequest(
            "request must include 'primaryEmail', 'emailStartsWith', or 'principalStartsWith'"
                .to_string(),
        ));
    }

    let query = params.into_query().map_err(AppError::BadRequest)?;

    let users = state
        .directory
        .execute(DirectoryQuery::FindUsers {
            org_id,
            filter,
            query,
        })
        .await?;

    Ok(Json(users.into_iter().map(UserV3::from).collect()))
}
