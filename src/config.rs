//! TOML configuration support for seeding a rule store.
//!
//! A configuration declares global settings, the network instances rules may
//! refer to, and an initial list of rules. It can be compiled in or read from
//! a file at runtime.
//!
//! # Example TOML Format
//!
//! ```toml
//! [settings]
//! max_page_size = 500
//!
//! [[instances]]
//! name = "gs-main"
//!
//! [[rules]]
//! priority = 10
//! grant = "allow"
//! role = "ROLE_EDITOR"
//! instance = "gs-main"
//! workspace = "topp"
//! layer = "states"
//! ip = "10.0.0.0/8"
//! constraints = { allowed_styles = ["population"], catalog_mode = "mixed" }
//!
//! [[rules]]
//! grant = "limit"
//! role = "ROLE_GUEST"
//! limits = { catalog_mode = "hide", allowed_area = "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))" }
//!
//! [[rules]]
//! grant = "deny"
//! ```
//!
//! Rules with a `priority` are placed at exactly that priority, lowest
//! first. Rules without one are appended below them in file order.
//!
//! # Usage
//!
//! ## Compile-time embedded config
//!
//! ```ignore
//! use georule_admin::RuleAdmin;
//!
//! const RULES: &str = include_str!("../rules.toml");
//!
//! let admin = RuleAdmin::from_toml(RULES).unwrap();
//! ```
//!
//! ## Runtime file loading
//!
//! ```ignore
//! use georule_admin::RuleAdmin;
//!
//! let admin = RuleAdmin::from_toml_file("config/rules.toml").unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::admin::{LimitsUpdate, RuleAdmin, RuleDraft, DEFAULT_MAX_PAGE_SIZE};
use crate::error::AdminError;
use crate::merge::ConstraintsInput;
use crate::rule::{parse_address_range, CatalogMode, GrantType, IdName};
use crate::table::InsertPosition;

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Global settings.
    #[serde(default)]
    pub settings: ConfigSettings,
    /// Network instances to register.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
    /// Initial rules.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Global configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSettings {
    /// Largest page size accepted by searches.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_max_page_size() -> usize {
    DEFAULT_MAX_PAGE_SIZE
}

impl Default for ConfigSettings {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
        }
    }
}

/// A network instance declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Unique instance name.
    pub name: String,
}

/// A single rule configuration. Omitted dimensions match anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Exact priority. Omitted means "append at the bottom".
    #[serde(default)]
    pub priority: Option<u64>,

    /// Access grant.
    pub grant: GrantType,

    /// User name.
    #[serde(default)]
    pub user: Option<String>,

    /// Role name.
    #[serde(default)]
    pub role: Option<String>,

    /// Name of a declared instance.
    #[serde(default)]
    pub instance: Option<String>,

    /// Service.
    #[serde(default)]
    pub service: Option<String>,

    /// Request.
    #[serde(default)]
    pub request: Option<String>,

    /// Workspace.
    #[serde(default)]
    pub workspace: Option<String>,

    /// Layer.
    #[serde(default)]
    pub layer: Option<String>,

    /// Source address or CIDR range. "*" or omitted means any address.
    #[serde(default)]
    pub ip: Option<String>,

    /// Layer details, for `allow` rules with a layer.
    #[serde(default)]
    pub constraints: Option<ConstraintsInput>,

    /// Limits, for `limit` rules.
    #[serde(default)]
    pub limits: Option<LimitsConfig>,
}

/// Limits of a `limit` rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Catalog mode.
    #[serde(default)]
    pub catalog_mode: Option<CatalogMode>,
    /// Allowed area as WKT.
    #[serde(default)]
    pub allowed_area: Option<String>,
}

/// Error type for configuration parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing error.
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File I/O error.
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Invalid IP pattern.
    #[error("Invalid IP pattern '{0}': {1}")]
    InvalidIp(String, String),

    /// A rule was rejected while seeding the store.
    #[error("Failed to load rule: {0}")]
    Admin(#[from] AdminError),
}

fn is_any_ip(ip: &str) -> bool {
    let ip = ip.trim();
    ip.is_empty() || ip == "*" || ip.eq_ignore_ascii_case("any")
}

impl AdminConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Example
    /// ```
    /// use georule_admin::config::AdminConfig;
    ///
    /// let toml = r#"
    /// [[instances]]
    /// name = "gs-main"
    ///
    /// [[rules]]
    /// grant = "allow"
    /// instance = "gs-main"
    /// layer = "states"
    /// "#;
    ///
    /// let config = AdminConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.rules.len(), 1);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: AdminConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "max_page_size must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for instance in &self.instances {
            if !names.insert(instance.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Instance '{}' declared twice",
                    instance.name
                )));
            }
        }

        let mut priorities = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if let Some(ref ip) = rule.ip {
                if !is_any_ip(ip) {
                    parse_address_range(ip)
                        .map_err(|e| ConfigError::InvalidIp(ip.clone(), e.to_string()))?;
                }
            }

            if let Some(priority) = rule.priority {
                if !priorities.insert(priority) {
                    return Err(ConfigError::Invalid(format!(
                        "Rule {}: priority {} is used by another rule",
                        i, priority
                    )));
                }
            }

            if let Some(ref instance) = rule.instance {
                if !names.contains(instance.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "Rule {}: instance '{}' is not declared",
                        i, instance
                    )));
                }
            }

            if rule.limits.is_some() && rule.grant != GrantType::Limit {
                return Err(ConfigError::Invalid(format!(
                    "Rule {}: limits require grant = \"limit\"",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Seed a new [`RuleAdmin`] with the configured instances and rules.
    ///
    /// # Example
    /// ```
    /// use georule_admin::config::AdminConfig;
    /// use georule_admin::filter::RuleFilter;
    ///
    /// let toml = r#"
    /// [[rules]]
    /// grant = "deny"
    ///
    /// [[rules]]
    /// priority = 3
    /// grant = "allow"
    /// layer = "states"
    /// "#;
    ///
    /// let admin = AdminConfig::from_toml(toml).unwrap().into_admin().unwrap();
    /// let priorities: Vec<u64> = admin
    ///     .search(&RuleFilter::any(), None)
    ///     .unwrap()
    ///     .iter()
    ///     .map(|r| r.priority)
    ///     .collect();
    /// assert_eq!(priorities, vec![3, 4]);
    /// ```
    pub fn into_admin(self) -> Result<RuleAdmin, ConfigError> {
        let admin = RuleAdmin::builder()
            .max_page_size(self.settings.max_page_size)
            .build();

        for instance in &self.instances {
            admin.register_instance(&instance.name)?;
        }

        let (mut fixed, appended): (Vec<RuleConfig>, Vec<RuleConfig>) =
            self.rules.into_iter().partition(|r| r.priority.is_some());
        fixed.sort_by_key(|r| r.priority);

        for rule in fixed.into_iter().chain(appended) {
            let position = match rule.priority {
                Some(priority) => InsertPosition::Fixed(priority),
                None => InsertPosition::FromEnd(0),
            };
            load_rule(&admin, rule, position)?;
        }

        tracing::debug!(rules = admin.count_all(), "Rule store seeded from configuration");
        Ok(admin)
    }
}

fn load_rule(
    admin: &RuleAdmin,
    config: RuleConfig,
    position: InsertPosition,
) -> Result<(), ConfigError> {
    let mut draft = RuleDraft::new(config.grant);
    draft.username = config.user;
    draft.rolename = config.role;
    draft.instance = config.instance.map(IdName::Name);
    draft.service = config.service;
    draft.request = config.request;
    draft.workspace = config.workspace;
    draft.layer = config.layer;
    draft.address_range = match config.ip {
        Some(ref ip) if !is_any_ip(ip) => Some(
            parse_address_range(ip).map_err(|e| ConfigError::InvalidIp(ip.clone(), e.to_string()))?,
        ),
        _ => None,
    };

    let constraints = config.constraints.map(ConstraintsInput::into_update);
    let id = admin.insert(draft, Some(position), constraints)?;

    if let Some(limits) = config.limits {
        admin.set_limits(
            id,
            LimitsUpdate {
                catalog_mode: limits.catalog_mode,
                allowed_area: limits.allowed_area,
            },
        )?;
    }
    Ok(())
}

impl RuleAdmin {
    /// Create a seeded facade from a TOML configuration string.
    ///
    /// # Example
    /// ```
    /// use georule_admin::RuleAdmin;
    ///
    /// const CONFIG: &str = r#"
    /// [settings]
    /// max_page_size = 50
    ///
    /// [[rules]]
    /// priority = 0
    /// grant = "allow"
    /// role = "ROLE_ADMIN"
    /// "#;
    ///
    /// let admin = RuleAdmin::from_toml(CONFIG).unwrap();
    /// assert_eq!(admin.count_all(), 1);
    /// assert_eq!(admin.max_page_size(), 50);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        AdminConfig::from_toml(toml_str)?.into_admin()
    }

    /// Create a seeded facade from a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        AdminConfig::from_file(path)?.into_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DimensionFilter, RuleFilter};

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[settings]
max_page_size = 20

[[instances]]
name = "gs-main"

[[instances]]
name = "gs-backup"

[[rules]]
priority = 10
grant = "allow"
role = "ROLE_EDITOR"
instance = "gs-main"
workspace = "topp"
layer = "states"
ip = "10.0.0.0/8"
constraints = { allowed_styles = ["population"], cql_filter_read = "PERSONS > 1000", catalog_mode = "mixed" }

[[rules]]
grant = "LIMIT"
role = "ROLE_GUEST"
limits = { catalog_mode = "challenge", allowed_area = "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))" }
"#;

        let config = AdminConfig::from_toml(toml).unwrap();
        assert_eq!(config.instances.len(), 2);
        assert_eq!(config.rules.len(), 2);

        let admin = config.into_admin().unwrap();
        assert_eq!(admin.max_page_size(), 20);
        assert_eq!(admin.instances().len(), 2);

        let allow = &admin
            .search(&RuleFilter::any().layer(DimensionFilter::exact("states")), None)
            .unwrap()[0];
        assert_eq!(allow.priority, 10);
        assert_eq!(allow.instance.as_ref().unwrap().name, "gs-main");
        assert_eq!(allow.address_range.unwrap().prefix(), 8);
        let details = allow.details.as_ref().unwrap();
        assert_eq!(details.catalog_mode, Some(CatalogMode::Mixed));
        assert!(details.allowed_styles.contains("population"));

        let limit = &admin
            .search(&RuleFilter::any().role(DimensionFilter::exact("ROLE_GUEST")), None)
            .unwrap()[0];
        assert_eq!(limit.priority, 11);
        let limits = limit.limits.as_ref().unwrap();
        assert_eq!(limits.catalog_mode, Some(CatalogMode::Challenge));
        assert!(limits.allowed_area.is_some());
    }

    #[test]
    fn test_fixed_rules_sorted_before_appended() {
        let toml = r#"
[[rules]]
grant = "deny"
layer = "tail"

[[rules]]
priority = 7
grant = "allow"
layer = "b"

[[rules]]
priority = 2
grant = "allow"
layer = "a"
"#;
        let admin = RuleAdmin::from_toml(toml).unwrap();
        let layers: Vec<(u64, String)> = admin
            .search(&RuleFilter::any(), None)
            .unwrap()
            .into_iter()
            .map(|r| (r.priority, r.layer.unwrap_or_default()))
            .collect();
        assert_eq!(
            layers,
            vec![
                (2, "a".to_string()),
                (7, "b".to_string()),
                (8, "tail".to_string())
            ]
        );
    }

    #[test]
    fn test_any_ip_is_wildcard() {
        let toml = r#"
[[rules]]
grant = "allow"
ip = "*"
"#;
        let admin = RuleAdmin::from_toml(toml).unwrap();
        let rule = &admin.search(&RuleFilter::any(), None).unwrap()[0];
        assert!(rule.address_range.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let bad_ip = r#"
[[rules]]
grant = "allow"
ip = "300.1.1.1"
"#;
        assert!(matches!(
            AdminConfig::from_toml(bad_ip),
            Err(ConfigError::InvalidIp(..))
        ));

        let duplicate_priority = r#"
[[rules]]
priority = 1
grant = "allow"

[[rules]]
priority = 1
grant = "deny"
"#;
        assert!(matches!(
            AdminConfig::from_toml(duplicate_priority),
            Err(ConfigError::Invalid(_))
        ));

        let unknown_instance = r#"
[[rules]]
grant = "allow"
instance = "nowhere"
"#;
        assert!(matches!(
            AdminConfig::from_toml(unknown_instance),
            Err(ConfigError::Invalid(_))
        ));

        let zero_page = "[settings]\nmax_page_size = 0\n";
        assert!(matches!(
            AdminConfig::from_toml(zero_page),
            Err(ConfigError::Invalid(_))
        ));

        let misplaced_limits = r#"
[[rules]]
grant = "deny"
limits = { catalog_mode = "hide" }
"#;
        assert!(matches!(
            AdminConfig::from_toml(misplaced_limits),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            AdminConfig::from_toml("rules = 5"),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_rejected_rule_surfaces_as_admin_error() {
        // Details on a rule without a layer are refused by the store.
        let toml = r#"
[[rules]]
grant = "allow"
constraints = { default_style = "x" }
"#;
        let err = RuleAdmin::from_toml(toml).unwrap_err();
        match err {
            ConfigError::Admin(e) => assert!(e.is_validation()),
            other => panic!("Expected Admin error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RuleAdmin::from_toml_file("/nonexistent/rules.toml"),
            Err(ConfigError::FileRead(_))
        ));
    }
}
