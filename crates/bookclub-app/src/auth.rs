use crate::{
    error::{ApiError, ApiResult},
    repository_from_request,
    state::{AppConfig, AppState},
};
use axum::{
    extract::{FromRequest as _, FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, RequestPartsExt,
};
use crate::validate::Garde;
use bookclub_dal::{
    discussion::{Discussion, DiscussionRepository},
    post::{Post, PostRepository},
    user::{CreateUser, User, UserRepository},
    wishlist::WishlistRepository,
    Error as DalError,
};
use http::{header::CONTENT_TYPE, request::Parts, StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::{debug, error, info, warn};

const SESSION_COOKIE_NAME: &str = "bookclub";
const SESSION_USER_KEY: &str = "user";

repository_from_request!(UserRepository);

/// Signed-in user as kept in session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

async fn session_user(session: &Session) -> ApiResult<Option<SessionUser>> {
    let user = session.get::<SessionUser>(SESSION_USER_KEY).await?;
    Ok(user)
}

async fn extract_session(parts: &mut Parts) -> ApiResult<Session> {
    parts.extract::<Session>().await.map_err(|e| {
        error!("Missing session: {}", e.1);
        ApiError::Internal(anyhow::anyhow!("session layer missing"))
    })
}

/// Extractor for handlers available only to signed-in users
pub struct CurrentUser(pub SessionUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = extract_session(parts).await?;
        match session_user(&session).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                debug!("No user in session");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Extractor for handlers which behave differently for anonymous callers
pub struct OptionalUser(pub Option<SessionUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = extract_session(parts).await?;
        Ok(OptionalUser(session_user(&session).await?))
    }
}

/// Guards privileged routes, the only place where admin capability is checked.
///
/// Anonymous callers get 401, signed-in non-admins 403.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let user = session_user(&session)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !state.admins().is_admin(&user.email) {
        warn!("User {} is not admin", user.id);
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    message: &'static str,
    user: SessionUser,
}

pub async fn register(
    user_registry: UserRepository,
    Garde(Json(payload)): Garde<Json<CreateUser>>,
) -> ApiResult<impl IntoResponse> {
    let user = user_registry.create(payload).await.map_err(|e| match e {
        DalError::AlreadyExists(_) => {
            ApiError::BadRequest("User with this email already exists".to_string())
        }
        e => e.into(),
    })?;
    info!("Registered new user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created",
            user: user.into(),
        }),
    ))
}

#[derive(Deserialize)]
struct LoginCredentials {
    email: String,
    password: String,
}

pub async fn login(
    user_registry: UserRepository,
    session: Session,
    request: Request,
) -> ApiResult<impl IntoResponse> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let credentials = if content_type.starts_with("application/json") {
        let Json(data) = Json::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| {
                debug!("Failed to get login credentials: {e}");
                ApiError::BadRequest("Invalid login request".to_string())
            })?;
        data
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(data) = Form::<LoginCredentials>::from_request(request, &())
            .await
            .map_err(|e| {
                debug!("Failed to get login credentials: {e}");
                ApiError::BadRequest("Invalid login request".to_string())
            })?;
        data
    } else {
        return Err(ApiError::BadRequest("Unsupported content type".to_string()));
    };

    let user = user_registry
        .check_password(&credentials.email, &credentials.password)
        .await?;

    session.cycle_id().await?;
    session
        .insert(SESSION_USER_KEY, SessionUser::from(user.clone()))
        .await?;
    debug!("User {} logged in", user.id);
    Ok(Json(user))
}

pub async fn logout(session: Session) -> impl IntoResponse {
    session
        .delete()
        .await
        .unwrap_or_else(|e| warn!("Failed to delete session: {e}"));
    StatusCode::NO_CONTENT
}

/// Stored record of signed-in user, session of deleted user is not valid
async fn stored_user(user_registry: &UserRepository, current: &SessionUser) -> ApiResult<User> {
    match user_registry.get(&current.id).await {
        Ok(user) => Ok(user),
        Err(DalError::RecordNotFound(_)) => Err(ApiError::Unauthorized),
        Err(e) => Err(e.into()),
    }
}

pub async fn me(
    CurrentUser(current): CurrentUser,
    user_registry: UserRepository,
) -> ApiResult<impl IntoResponse> {
    let user = stored_user(&user_registry, &current).await?;
    Ok(Json(user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: User,
    pub wishlist_count: u64,
    pub posts: Vec<Post>,
    pub discussions: Vec<Discussion>,
}

/// User record with own activity: wishlist size, posts and started discussions
pub async fn profile(
    CurrentUser(current): CurrentUser,
    user_registry: UserRepository,
    wishlist: WishlistRepository,
    posts: PostRepository,
    discussions: DiscussionRepository,
) -> ApiResult<impl IntoResponse> {
    let user = stored_user(&user_registry, &current).await?;
    let profile = Profile {
        wishlist_count: wishlist.count_for_user(&user.id).await?,
        posts: posts.list_for_user(&user.id).await?,
        discussions: discussions.list_for_user(&user.id).await?,
        user,
    };
    Ok(Json(profile))
}

/// Session handling for whole API, sessions live in memory
pub fn session_layer(config: &AppConfig) -> SessionManagerLayer<MemoryStore> {
    let expiry = time::Duration::try_from(config.session_expiry).unwrap_or(time::Duration::DAY);
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(config.secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(expiry))
}

/// Builds authentication router - must be nested on /api/auth path!
pub fn auth_router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/profile", get(profile))
}
