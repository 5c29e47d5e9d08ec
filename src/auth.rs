//! Authentication utilities: JWT validation and permission checks

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::Request;

/// Permission required to submit a contact import
pub const IMPORT_CONTACTS_PERMISSION: &str = "contacts:create";

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// User role (admin, customer, worker)
    pub role: String,
    /// Owner ID (for workers - the customer who created them)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication provided, JWT token is required")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid {0} in token")]
    InvalidId(&'static str),
}

/// Single capability check consumed by the ingestion pipeline
pub trait Authorizer {
    fn is_granted(&self, action: &str) -> bool;
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub role: String,
    /// For workers, the customer's user_id (used for data queries)
    pub owner_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl AuthInfo {
    /// Returns the user_id to use for data queries.
    /// Workers use their owner's user_id so they see the same data as their customer.
    pub fn data_user_id(&self) -> Uuid {
        if self.role == "worker" {
            self.owner_id.unwrap_or(self.user_id)
        } else {
            self.user_id
        }
    }
}

/// `*` grants everything, `contacts:*` grants every `contacts:` action.
fn permission_matches(granted: &str, action: &str) -> bool {
    if granted == "*" || granted == action {
        return true;
    }
    granted
        .strip_suffix('*')
        .is_some_and(|prefix| prefix.ends_with(':') && action.starts_with(prefix))
}

impl Authorizer for AuthInfo {
    fn is_granted(&self, action: &str) -> bool {
        self.role == "admin"
            || self
                .permissions
                .iter()
                .any(|granted| permission_matches(granted, action))
    }
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Extract authentication info from a NATS request.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo, AuthError> {
    let token = request.token.as_deref().ok_or(AuthError::MissingToken)?;
    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidId("user_id"))?;
    let owner_id = claims
        .owner_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .map_err(|_| AuthError::InvalidId("owner_id"))?;

    Ok(AuthInfo {
        user_id,
        role: claims.role,
        owner_id,
        permissions: claims.permissions,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    pub(crate) fn generate_token(
        user_id: Uuid,
        role: &str,
        owner_id: Option<Uuid>,
        permissions: &[&str],
        secret: &str,
    ) -> String {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            email: "test@example.com".to_string(),
            role: role.to_string(),
            owner_id: owner_id.map(|id| id.to_string()),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            iat: now,
            exp: now + 60 * 60,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn make_request(token: Option<String>) -> Request<serde_json::Value> {
        Request {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token,
            payload: serde_json::Value::Null,
        }
    }

    fn auth_with(role: &str, permissions: &[&str]) -> AuthInfo {
        AuthInfo {
            user_id: Uuid::new_v4(),
            role: role.to_string(),
            owner_id: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_extract_auth_with_valid_token() {
        let user_id = Uuid::new_v4();
        let token = generate_token(user_id, "customer", None, &["contacts:create"], TEST_SECRET);

        let auth = extract_auth(&make_request(Some(token)), TEST_SECRET).unwrap();

        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role, "customer");
        assert_eq!(auth.permissions, vec!["contacts:create".to_string()]);
        assert_eq!(auth.data_user_id(), user_id);
    }

    #[test]
    fn test_extract_auth_worker_uses_owner_data() {
        let user_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let token = generate_token(user_id, "worker", Some(owner_id), &[], TEST_SECRET);

        let auth = extract_auth(&make_request(Some(token)), TEST_SECRET).unwrap();

        assert_eq!(auth.owner_id, Some(owner_id));
        assert_eq!(auth.data_user_id(), owner_id);
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        let result = extract_auth(&make_request(None), TEST_SECRET);
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_extract_auth_wrong_secret_fails() {
        let token = generate_token(Uuid::new_v4(), "customer", None, &[], TEST_SECRET);
        let result = extract_auth(&make_request(Some(token)), "another-secret-another-secret-xx");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_extract_auth_malformed_token_fails() {
        let result = extract_auth(&make_request(Some("not.a.token".into())), TEST_SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_exact_permission_grants_import() {
        assert!(auth_with("customer", &["contacts:create"]).is_granted(IMPORT_CONTACTS_PERMISSION));
    }

    #[test]
    fn test_wildcard_permissions() {
        assert!(auth_with("customer", &["*"]).is_granted(IMPORT_CONTACTS_PERMISSION));
        assert!(auth_with("customer", &["contacts:*"]).is_granted(IMPORT_CONTACTS_PERMISSION));
        assert!(!auth_with("customer", &["contact*"]).is_granted(IMPORT_CONTACTS_PERMISSION));
        assert!(!auth_with("customer", &["routes:*"]).is_granted(IMPORT_CONTACTS_PERMISSION));
    }

    #[test]
    fn test_admin_is_always_granted() {
        assert!(auth_with("admin", &[]).is_granted(IMPORT_CONTACTS_PERMISSION));
    }

    #[test]
    fn test_missing_permission_is_denied() {
        assert!(!auth_with("worker", &["page:inbox"]).is_granted(IMPORT_CONTACTS_PERMISSION));
    }
}
