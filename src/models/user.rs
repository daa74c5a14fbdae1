// User account payloads

use serde::Serialize;

/// `POST /users/login` body
#[derive(Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /users` body
#[derive(Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signup_request_serialization() {
        let body = SignupRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Ada", "email": "ada@example.com", "password": "hunter22"})
        );
    }
}
