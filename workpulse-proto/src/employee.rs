//! Employee directory records and portal roles.

use serde::{Deserialize, Serialize};

use crate::task::UserId;

/// Portal role of a user. Decides which collections a screen may load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Company administrator.
    Admin,
    /// HR manager.
    HrManager,
    /// Manager of a single department.
    DepartmentManager,
    /// Regular employee.
    Employee,
}

impl Role {
    /// Whether this role may create and assign tasks.
    #[must_use]
    pub const fn can_assign_tasks(self) -> bool {
        matches!(self, Self::Admin | Self::HrManager | Self::DepartmentManager)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "hr_manager" => Ok(Self::HrManager),
            "department_manager" => Ok(Self::DepartmentManager),
            "employee" => Ok(Self::Employee),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// An entry of the employee directory (full list or names-only list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    /// User identifier.
    pub id: UserId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Role, absent in the names-only list.
    #[serde(default)]
    pub role: Option<Role>,
    /// Department, absent in the names-only list.
    #[serde(default)]
    pub department_id: Option<i64>,
}
