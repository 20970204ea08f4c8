use anyhow::Error as AnyError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppError;

/// A JSON body whose rejection is turned into an `AppError` by the handler,
/// after authentication has run.
pub(crate) type JsonBody<T> = Result<Json<T>, JsonRejection>;

pub fn append_set_cookie_headers(
    response: &mut Response,
    cookies: &[String],
) -> Result<(), AppError> {
    for cookie in cookies {
        let value =
            HeaderValue::from_str(cookie).map_err(|err| AppError::internal(AnyError::new(err)))?;
        response.headers_mut().append(SET_COOKIE, value);
    }

    Ok(())
}

/// JSON body with any session cookies refreshed during authentication.
pub fn json_with_cookies<T: Serialize>(
    status: StatusCode,
    body: T,
    cookies: &[String],
) -> Result<Response, AppError> {
    let mut response = (status, Json(body)).into_response();
    append_set_cookie_headers(&mut response, cookies)?;
    Ok(response)
}
