use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// User - Identity and Role
// ============================================================================
//
// The balance itself lives in the Ledger; a User record only carries identity
// and profile data threaded through sessions and reports.
//
// ============================================================================

/// Actor role. The wire contract encodes roles as small integers
/// (0 = student, 1 = cook, 2 = admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Cook,
    Admin,
}

impl Role {
    pub fn code(self) -> u8 {
        match self {
            Role::Student => 0,
            Role::Cook => 1,
            Role::Admin => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Role::Student),
            1 => Some(Role::Cook),
            2 => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub class_name: Option<String>,
    pub allergies: Option<String>,
    pub dietary_preferences: Option<String>,
}

impl User {
    pub fn new(role: Role, full_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            full_name: full_name.into(),
            class_name: None,
            allergies: None,
            dietary_preferences: None,
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }
}
