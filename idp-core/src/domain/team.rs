//! Team domain types

use serde::{Deserialize, Serialize};

/// Stack permission level granted to a team on provisioning (admin).
pub const STACK_ADMIN_PERMISSION: u32 = 103;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub user_role: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamList {
    #[serde(default)]
    pub teams: Vec<Team>,
}

/// Body of the team update call that adds a stack permission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackPermissionGrant {
    pub add_stack_permission: StackPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackPermission {
    pub project_name: String,
    pub stack_name: String,
    pub permission: u32,
}

impl StackPermissionGrant {
    pub fn new(project: &str, stack: &str, permission: u32) -> Self {
        Self {
            add_stack_permission: StackPermission {
                project_name: project.to_string(),
                stack_name: stack.to_string(),
                permission,
            },
        }
    }
}
