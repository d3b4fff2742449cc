use crate::error::{ApiError, ApiResult};
use crate::store::{FollowStore, UserStore};
use crate::types::{UpdateUserRequest, User, UserCounts};

/// Store a new profile. An id is generated when the caller leaves it blank.
pub async fn create_user(users: &dyn UserStore, mut user: User) -> ApiResult<User> {
    if user.id.trim().is_empty() {
        user.id = uuid::Uuid::new_v4().to_string();
    }

    let saved = users.save(user).await?;
    tracing::info!("Created user {} ({})", saved.id, saved.username);
    Ok(saved)
}

/// Username fragment search used for @mentions. Results never carry email
/// or password.
pub async fn search_users(users: &dyn UserStore, query: &str) -> ApiResult<Vec<User>> {
    let found = users.find_by_username_containing(query).await?;
    tracing::debug!("User search '{}' matched {}", query, found.len());
    Ok(found.into_iter().map(User::scrubbed_for_search).collect())
}

pub async fn list_users(users: &dyn UserStore) -> ApiResult<Vec<User>> {
    Ok(users.find_all().await?)
}

pub async fn get_user(users: &dyn UserStore, user_id: &str) -> ApiResult<User> {
    users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", "id", user_id))
}

pub async fn get_user_by_username(users: &dyn UserStore, username: &str) -> ApiResult<User> {
    users
        .find_by_username(username)
        .await?
        .ok_or_else(|| ApiError::not_found("User", "username", username))
}

/// Sparse profile update. Fields left out of `req` keep their stored value.
/// A username or email already held by another account is a conflict and
/// nothing is written.
pub async fn update_user(
    users: &dyn UserStore,
    user_id: &str,
    req: UpdateUserRequest,
) -> ApiResult<User> {
    let mut user = get_user(users, user_id).await?;

    if let Some(username) = req.username {
        if username != user.username {
            if users.find_by_username(&username).await?.is_some() {
                return Err(ApiError::Conflict("Username is already taken".to_string()));
            }
            user.username = username;
        }
    }

    if let Some(email) = req.email {
        if user.email.as_deref() != Some(email.as_str()) {
            if users.find_by_email(&email).await?.is_some() {
                return Err(ApiError::Conflict("Email is already registered".to_string()));
            }
            user.email = Some(email);
        }
    }

    if let Some(bio) = req.bio {
        user.bio = Some(bio);
    }
    if let Some(role) = req.role {
        user.role = Some(role);
    }
    if let Some(full_name) = req.full_name {
        user.full_name = Some(full_name);
    }
    if let Some(specializations) = req.specializations {
        user.specializations = specializations;
    }

    let saved = users.save(user).await?;
    tracing::info!("Updated user {}", saved.id);
    Ok(saved.without_password())
}

pub async fn get_user_counts(follows: &dyn FollowStore, user_id: &str) -> ApiResult<UserCounts> {
    Ok(UserCounts {
        followers: follows.count_by_followed_id(user_id).await?,
        following: follows.count_by_follower_id(user_id).await?,
    })
}
