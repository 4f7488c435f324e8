use serde_json::Value;

use super::test_app::TestApp;

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub role: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub const PASSWORD: &str = "Password123!";

pub fn push_token(name: &str) -> String {
    format!("ExponentPushToken[{name}]")
}

impl TestApp {
    /// Register a user and return their auth info. A username equal to a
    /// category key gets that responder role.
    pub async fn register_user(&self, username: &str, push_token: Option<&str>) -> SeededUser {
        let email = format!("{}@test.com", username.to_lowercase());
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&serde_json::json!({
                "email": email,
                "username": username,
                "password": PASSWORD,
                "push_token": push_token,
            }))
            .send()
            .await
            .expect("Register request failed");

        assert_eq!(resp.status().as_u16(), 201, "Register failed for {username}");
        let json: Value = resp.json().await.expect("Failed to parse register response");

        SeededUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email,
            username: username.to_string(),
            role: json["user"]["role"].as_str().unwrap().to_string(),
            access_token: json["access_token"].as_str().unwrap().to_string(),
            refresh_token: json["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub async fn raise_panic(&self, user: &SeededUser, category: &str) -> Value {
        let resp = self
            .auth_post("/api/panic-alert", &user.access_token)
            .json(&serde_json::json!({
                "category": category,
                "location": { "latitude": -34.6, "longitude": -58.4 },
                "address": "Av. Corrientes 1234",
            }))
            .send()
            .await
            .expect("Create panic alert failed");
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }

    pub async fn create_notification(&self, user: &SeededUser, category: &str, title: &str) -> Value {
        let resp = self
            .auth_post("/api/notification", &user.access_token)
            .json(&serde_json::json!({
                "category": category,
                "title": title,
                "description": "Hay humo saliendo del edificio",
            }))
            .send()
            .await
            .expect("Create notification failed");
        assert_eq!(resp.status().as_u16(), 201);
        resp.json().await.unwrap()
    }
}
