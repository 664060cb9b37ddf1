use read_analytics::auth::sign_jwt_for_user;

use super::app::TestApp;

pub fn token_for(app: &TestApp, user_id: &str) -> String {
    sign_jwt_for_user(user_id, &app.config.jwt_secret, 1).expect("sign test token")
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn bearer_for(app: &TestApp, user_id: &str) -> (&'static str, String) {
    ("authorization", auth_header(&token_for(app, user_id)))
}
