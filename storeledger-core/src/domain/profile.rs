//! Profile, roles and permissions

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Role of a user inside their company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Accountant,
    Manager,
    User,
}

/// Actions gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewReports,
    ViewAllStores,
    ManageTransactions,
    ManageCategories,
    ManageStores,
    ManageMembers,
    ExportData,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ViewReports,
        Permission::ViewAllStores,
        Permission::ManageTransactions,
        Permission::ManageCategories,
        Permission::ManageStores,
        Permission::ManageMembers,
        Permission::ExportData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewReports => "view_reports",
            Permission::ViewAllStores => "view_all_stores",
            Permission::ManageTransactions => "manage_transactions",
            Permission::ManageCategories => "manage_categories",
            Permission::ManageStores => "manage_stores",
            Permission::ManageMembers => "manage_members",
            Permission::ExportData => "export_data",
        }
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Accountant => "accountant",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "accountant" => Ok(Role::Accountant),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(Error::validation(format!("Unknown role: {}", other))),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Owner => true,
            Role::Accountant => !matches!(permission, ManageStores | ManageMembers),
            Role::Manager => matches!(permission, ViewReports | ManageTransactions | ExportData),
            Role::User => matches!(permission, ManageTransactions),
        }
    }

    pub fn permissions(&self) -> Vec<Permission> {
        Permission::ALL.into_iter().filter(|p| self.can(*p)).collect()
    }
}

/// Which stores a user may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScope {
    All,
    Only(Vec<String>),
}

impl StoreScope {
    /// Company-level records (no store) are only visible with `All`
    pub fn allows(&self, store_id: Option<&str>) -> bool {
        match (self, store_id) {
            (StoreScope::All, _) => true,
            (StoreScope::Only(ids), Some(id)) => ids.iter().any(|s| s == id),
            (StoreScope::Only(_), None) => false,
        }
    }
}

/// Per-user record carrying role and company association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the auth user id
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub managed_store_ids: Vec<String>,
}

/// Array columns come back as `null` when never written
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Profile {
    pub fn new(id: impl Into<String>, role: Role, company_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            role,
            company_id: Some(company_id.into()),
            managed_store_ids: Vec::new(),
        }
    }

    pub fn store_scope(&self) -> StoreScope {
        if self.role.can(Permission::ViewAllStores) {
            StoreScope::All
        } else {
            StoreScope::Only(self.managed_store_ids.clone())
        }
    }
}

/// Input for changing a member's role or store assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberUpdate {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub managed_store_ids: Option<Vec<String>>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert_eq!(Role::Owner.permissions().len(), Permission::ALL.len());

        assert!(Role::Accountant.can(Permission::ViewAllStores));
        assert!(Role::Accountant.can(Permission::ManageCategories));
        assert!(!Role::Accountant.can(Permission::ManageMembers));
        assert!(!Role::Accountant.can(Permission::ManageStores));

        assert!(Role::Manager.can(Permission::ViewReports));
        assert!(!Role::Manager.can(Permission::ViewAllStores));
        assert!(!Role::Manager.can(Permission::ManageCategories));

        assert_eq!(Role::User.permissions(), vec![Permission::ManageTransactions]);
    }

    #[test]
    fn test_store_scope() {
        let mut profile = Profile::new("u1", Role::Manager, "c1");
        profile.managed_store_ids = vec!["s1".to_string()];

        let scope = profile.store_scope();
        assert!(scope.allows(Some("s1")));
        assert!(!scope.allows(Some("s2")));
        assert!(!scope.allows(None));

        profile.role = Role::Accountant;
        assert_eq!(profile.store_scope(), StoreScope::All);
        assert!(profile.store_scope().allows(None));
    }

    #[test]
    fn test_null_managed_stores() {
        let profile: Profile = serde_json::from_value(serde_json::json!({
            "id": "u1", "role": "user", "company_id": "c1", "managed_store_ids": null
        }))
        .unwrap();
        assert!(profile.managed_store_ids.is_empty());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Accountant).unwrap(), "\"accountant\"");
        assert_eq!(Role::parse(" Manager ").unwrap(), Role::Manager);
        assert!(Role::parse("admin").is_err());
    }
}
