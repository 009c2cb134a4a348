mod auth;
mod health_check;

pub use auth::{get_current_user, login, refresh, register};
pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UserResponse};
pub use health_check::health_check;
