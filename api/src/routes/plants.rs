//! Plant database proxy
//!
//! Query parameters are forwarded untouched; the upstream JSON is returned
//! as the response data.

use agro_advisor::PlantEndpoint;
use axum::extract::State;
use serde_json::Value;

use crate::{
    auth::AuthUser,
    error::{ApiResponse, ApiResult},
    extract::{ApiPath, ApiQuery},
    state::AppState,
};

type Params = Vec<(String, String)>;

async fn proxy(state: &AppState, endpoint: PlantEndpoint, params: &Params) -> ApiResult<Value> {
    let data = state.plants()?.fetch(endpoint, params).await?;
    Ok(ApiResponse::ok(data, "plant data"))
}

pub async fn species(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<Params>,
) -> ApiResult<Value> {
    proxy(&state, PlantEndpoint::SpeciesList, &params).await
}

pub async fn details(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(params): ApiQuery<Params>,
) -> ApiResult<Value> {
    proxy(&state, PlantEndpoint::SpeciesDetails(id), &params).await
}

pub async fn vulnerabilities(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<Params>,
) -> ApiResult<Value> {
    proxy(&state, PlantEndpoint::PestDiseaseList, &params).await
}

pub async fn care(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<Params>,
) -> ApiResult<Value> {
    proxy(&state, PlantEndpoint::CareGuide, &params).await
}

pub async fn faq(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<Params>,
) -> ApiResult<Value> {
    proxy(&state, PlantEndpoint::Faq, &params).await
}
