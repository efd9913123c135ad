use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// Role flags attached to an identity as custom claims.
///
/// Issued so that exactly one flag is set; an identity that never had claims
/// issued carries neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleClaim {
    #[serde(default)]
    pub is_medical_staff: bool,
    #[serde(default)]
    pub is_patient: bool,
}

impl RoleClaim {
    pub const MEDICAL_STAFF: RoleClaim = RoleClaim {
        is_medical_staff: true,
        is_patient: false,
    };

    pub const PATIENT: RoleClaim = RoleClaim {
        is_medical_staff: false,
        is_patient: true,
    };

    /// Staff registry presence decides the role.
    pub fn from_registry_presence(is_registered_staff: bool) -> Self {
        if is_registered_staff {
            Self::MEDICAL_STAFF
        } else {
            Self::PATIENT
        }
    }
}

/// Verified identity carried by an ID token or session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedClaims {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: RoleClaim,
}

impl DecodedClaims {
    pub fn is_patient(&self) -> bool {
        self.role.is_patient
    }

    pub fn is_medical_staff(&self) -> bool {
        self.role.is_medical_staff
    }
}

/// Authenticated caller attached to the request by the session middleware.
pub type AuthUser = DecodedClaims;

/// `Set-Cookie` value carrying a freshly issued session.
pub fn session_cookie(config: &SessionConfig, token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        token,
        config.max_age_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0",
        config.cookie_name
    )
}

/// Find a cookie value in a `Cookie` request header.
pub fn token_from_cookie_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
