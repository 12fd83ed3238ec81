use serde::{Deserialize, Serialize};

/// The authenticated session, written and cleared as one record so a
/// concurrent reader never sees a half-established login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub user_type: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub group_name: Option<String>,
}
