use axum::extract::{FromRequest, FromRequestParts, Request};
use garde::Validate;
use http::request::Parts;
use std::fmt::Display;
use std::ops::{Deref, DerefMut};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Extractor wrapper which validates extracted payload with garde.
///
/// Both failures, unparsable input and invalid data, are rejected as
/// [`ApiError::BadRequest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Garde<E>(pub E);

impl<E> Deref for Garde<E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<E> DerefMut for Garde<E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<E> Garde<E> {
    pub fn into_inner(self) -> E {
        self.0
    }
}

fn check<T: Validate<Context = ()>>(value: &T) -> Result<(), ApiError> {
    value.validate().map_err(|report| {
        debug!("Invalid payload: {report}");
        ApiError::BadRequest(report.to_string())
    })
}

fn inner_rejection(rejection: impl Display) -> ApiError {
    debug!("Unparsable request: {rejection}");
    ApiError::BadRequest(rejection.to_string())
}

impl<Extractor, T> FromRequest<AppState> for Garde<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequest<AppState>,
    <Extractor as FromRequest<AppState>>::Rejection: Display,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request(req, state)
            .await
            .map_err(inner_rejection)?;
        check(inner.deref())?;
        Ok(Garde(inner))
    }
}

impl<Extractor, T> FromRequestParts<AppState> for Garde<Extractor>
where
    T: Validate<Context = ()>,
    Extractor: Deref<Target = T> + FromRequestParts<AppState>,
    <Extractor as FromRequestParts<AppState>>::Rejection: Display,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let inner = Extractor::from_request_parts(parts, state)
            .await
            .map_err(inner_rejection)?;
        check(inner.deref())?;
        Ok(Garde(inner))
    }
}
