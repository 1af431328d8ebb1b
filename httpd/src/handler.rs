use anyhow::Result;
use http::{header::USER_AGENT, Method, StatusCode};

use crate::{
    http::{IntoResponse, Request, Response},
    router::{Params, Router},
    storage::is_file_name,
    AppState,
};

/// Builds the route table served by `httpd`.
pub fn routes() -> Result<Router<AppState>, regex_lite::Error> {
    Router::new()
        .literal(Method::GET, "/", root)
        .literal(Method::GET, "/user-agent", user_agent)
        .pattern(Method::GET, r"^/echo/([A-Za-z]+)$", echo)?
        .pattern(Method::GET, r"^/files/([A-Za-z0-9_.\-]+)$", read_file)?
        .pattern(Method::POST, r"^/files/([A-Za-z0-9_.\-]+)$", write_file)
}

async fn root(_: Request, _: Params, _: AppState) -> Result<Response> {
    Ok(StatusCode::OK.into_response())
}

async fn user_agent(request: Request, _: Params, _: AppState) -> Result<Response> {
    let agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());

    let Some(agent) = agent else {
        return Ok(StatusCode::BAD_REQUEST.into_response());
    };

    Ok((StatusCode::OK, agent.to_owned()).into_response())
}

async fn echo(_: Request, params: Params, _: AppState) -> Result<Response> {
    Ok((StatusCode::OK, params[0].to_owned()).into_response())
}

async fn read_file(_: Request, params: Params, app_state: AppState) -> Result<Response> {
    if !is_file_name(&params[0]) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    match app_state.files.read(&params[0]).await? {
        Some(contents) => Ok((StatusCode::OK, contents).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn write_file(request: Request, params: Params, app_state: AppState) -> Result<Response> {
    if !is_file_name(&params[0]) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    app_state.files.write(&params[0], request.body()).await?;

    Ok(StatusCode::CREATED.into_response())
}
