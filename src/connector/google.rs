//! Google Workspace connector (Admin SDK, Gmail, Calendar).
//!
//! Uses a service account with domain-wide delegation. Required settings:
//! `GOOGLE_SERVICE_ACCOUNT_JSON` (the full key JSON) and
//! `GOOGLE_ADMIN_EMAIL` (the admin user to impersonate). Optional:
//! `GOOGLE_DOMAIN`.
//!
//! Tokens are obtained via an RS256 JWT assertion against the OAuth2
//! token endpoint.

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::{ErrorKind, ServiceError};
use crate::result_map;
use crate::service::{param_list, param_opt, param_str, Params, Service};
use crate::trace::ExecutionTrace;

use super::{log_success, status_error};

const ADMIN_API: &str = "https://admin.googleapis.com/admin/directory/v1";
const GMAIL_API: &str = "https://gmail.googleapis.com/gmail/v1";
const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/admin.directory.user",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/calendar",
];

/// Generate a random temporary password for a newly provisioned user.
fn temp_password(_employee_name: &str) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%";
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Serialize)]
struct TokenClaims {
    iss: String,
    sub: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Real Google Workspace connector.
pub struct GoogleConnector {
    sa_info: Value,
    admin_email: String,
    domain: String,
    trace: ExecutionTrace,
    http: reqwest::Client,
}

impl GoogleConnector {
    pub fn from_settings(settings: &Settings, trace: ExecutionTrace, http: reqwest::Client) -> Self {
        let sa_info = settings
            .google_service_account_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| json!({}));
        Self {
            sa_info,
            admin_email: settings.google_admin_email.clone().unwrap_or_default(),
            domain: settings.google_domain.clone().unwrap_or_default(),
            trace,
            http,
        }
    }

    pub fn is_configured(settings: &Settings) -> bool {
        settings.google_service_account_json.is_some() && settings.google_admin_email.is_some()
    }

    /// Obtain an access token via the service-account JWT assertion flow.
    async fn access_token(&self) -> Result<String, ServiceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: self.sa_info["client_email"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            sub: self.admin_email.clone(),
            scope: SCOPES.join(" "),
            aud: TOKEN_URL.to_string(),
            iat: now,
            exp: now + 3600,
        };

        let private_key = self.sa_info["private_key"].as_str().unwrap_or_default();
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_key.as_bytes())
            .map_err(|e| {
                ServiceError::new(
                    ErrorKind::AuthError,
                    format!("Invalid Google service account key: {e}"),
                )
            })?;
        let assertion = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &key,
        )
        .map_err(|e| {
            ServiceError::new(ErrorKind::AuthError, format!("Failed to sign JWT: {e}"))
        })?;

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Google token request failed: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::connector(format!("Google returned invalid JSON: {e}")))?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::new(
                    ErrorKind::AuthError,
                    format!("Failed to obtain Google access token: {body}"),
                )
            })
    }

    async fn provision_account(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let employee_name = param_str(params, "employee_name", "");
        let parts: Vec<&str> = employee_name.split_whitespace().collect();
        let given_name = parts.first().copied().unwrap_or(employee_name);
        let family_name = if parts.len() > 1 {
            parts[parts.len() - 1]
        } else {
            ""
        };
        let safe_name = employee_name.trim().to_lowercase().replace(' ', ".");
        let email = param_opt(params, "email")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{safe_name}@{}", self.domain));

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{ADMIN_API}/users"))
            .bearer_auth(&token)
            .json(&json!({
                "primaryEmail": email,
                "name": {"givenName": given_name, "familyName": family_name},
                "password": temp_password(employee_name),
                "changePasswordAtNextLogin": true,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Google request failed: {e}")))?;

        let status = response.status().as_u16();
        if status == 409 {
            return Err(ServiceError::new(
                ErrorKind::AlreadyExists,
                format!("Google account {email} already exists"),
            ));
        }
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("google", "provision_account", status, &body));
        }

        let result = result_map! {
            "email" => email,
            "status" => "provisioned",
        };
        log_success(
            &self.trace,
            "google",
            node_id,
            "provision_account",
            params,
            &result,
        );
        Ok(result)
    }

    async fn send_email(&self, node_id: &str, params: &Params) -> Result<Params, ServiceError> {
        let to = param_str(params, "to", "");
        let subject = param_str(params, "subject", "");
        let body = param_str(params, "body", "");

        let message = format!(
            "From: {}\r\nTo: {to}\r\nSubject: {subject}\r\n\r\n{body}",
            self.admin_email
        );
        let raw = base64::engine::general_purpose::URL_SAFE.encode(message);

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{GMAIL_API}/users/{}/messages/send",
                self.admin_email
            ))
            .bearer_auth(&token)
            .json(&json!({"raw": raw}))
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Gmail request failed: {e}")))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("google", "send_email", status, &body));
        }

        let result = result_map! {
            "to" => to,
            "subject" => subject,
            "status" => "sent",
        };
        log_success(&self.trace, "google", node_id, "send_email", params, &result);
        Ok(result)
    }

    async fn create_calendar_event(
        &self,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        let title = param_str(params, "title", "Meeting");
        let attendees = param_list(params, "attendees");
        let date = param_str(params, "date", "2026-01-01");

        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{CALENDAR_API}/calendars/{}/events",
                self.admin_email
            ))
            .bearer_auth(&token)
            .json(&json!({
                "summary": title,
                "attendees": attendees.iter().map(|a| json!({"email": a})).collect::<Vec<_>>(),
                "start": {"date": date},
                "end": {"date": date},
            }))
            .send()
            .await
            .map_err(|e| ServiceError::connector(format!("Calendar request failed: {e}")))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("google", "create_calendar_event", status, &body));
        }

        let result = result_map! {
            "title" => title,
            "attendees" => attendees,
            "status" => "created",
        };
        log_success(
            &self.trace,
            "google",
            node_id,
            "create_calendar_event",
            params,
            &result,
        );
        Ok(result)
    }
}

#[async_trait]
impl Service for GoogleConnector {
    fn name(&self) -> &str {
        "google"
    }

    fn actions(&self) -> Vec<&str> {
        vec!["provision_account", "send_email", "create_calendar_event"]
    }

    async fn call(
        &self,
        action: &str,
        node_id: &str,
        params: &Params,
    ) -> Result<Params, ServiceError> {
        match action {
            "provision_account" => self.provision_account(node_id, params).await,
            "send_email" => self.send_email(node_id, params).await,
            "create_calendar_event" => self.create_calendar_event(node_id, params).await,
            _ => Err(ServiceError::unknown_action("google", action)),
        }
    }
}
