//! Route paths.

pub const GET_HEALTH: &str = "/health";
pub const POST_LOGIN: &str = "/login";
pub const POST_REGISTER: &str = "/register";
pub const POST_FORGOT_PASSWORD: &str = "/forgot-password";
pub const POST_RESET_PASSWORD: &str = "/reset-password";
pub const POST_VERIFY_EMAIL: &str = "/verify-email";
pub const POST_RESEND_VERIFICATION: &str = "/resend-verification";
pub const POST_REFRESH_TOKEN: &str = "/refresh-token";
pub const PROFILE: &str = "/profile";
pub const POST_CHANGE_PASSWORD: &str = "/change-password";
pub const DELETE_USERS_ID: &str = "/users/{id}";
