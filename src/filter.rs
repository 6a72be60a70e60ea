//! Administrative rule filters.
//!
//! A [`RuleFilter`] carries one [`DimensionFilter`] per rule dimension. Each
//! dimension filter is one of:
//!
//! - **Any**: the dimension is ignored
//! - **Default**: only rules where the dimension is absent match
//! - **Value**: rules with exactly this value match, plus rules where the
//!   dimension is absent when `include_default` is set
//!
//! Raw request parameters are turned into filters by [`resolve_text`] and
//! [`resolve_id_name`], or all at once by [`FilterParams::resolve`].

use serde::Deserialize;

use crate::error::{AdminError, Result};
use crate::rule::{IdName, Instance, InstanceId, Rule};

/// Filter over a single rule dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionFilter<V> {
    /// Ignore the dimension.
    Any,
    /// Match rules where the dimension is absent.
    Default,
    /// Match rules with this value.
    Value {
        /// Value to match.
        value: V,
        /// Also match rules where the dimension is absent.
        include_default: bool,
    },
}

impl<V> Default for DimensionFilter<V> {
    fn default() -> Self {
        Self::Any
    }
}

impl<V> DimensionFilter<V> {
    /// Match exactly this value.
    pub fn exact(value: impl Into<V>) -> Self {
        Self::Value {
            value: value.into(),
            include_default: false,
        }
    }

    /// Match this value or rules where the dimension is absent.
    pub fn or_default(value: impl Into<V>) -> Self {
        Self::Value {
            value: value.into(),
            include_default: true,
        }
    }

    fn admits<T: ?Sized>(&self, field: Option<&T>, same: impl Fn(&V, &T) -> bool) -> bool {
        match self {
            Self::Any => true,
            Self::Default => field.is_none(),
            Self::Value {
                value,
                include_default,
            } => match field {
                Some(field) => same(value, field),
                None => *include_default,
            },
        }
    }
}

/// Filter over a name-valued dimension.
pub type TextFilter = DimensionFilter<String>;

/// Filter over the instance dimension.
pub type InstanceFilter = DimensionFilter<IdName>;

impl TextFilter {
    /// Check a rule's dimension value against this filter.
    pub fn matches(&self, field: Option<&str>) -> bool {
        self.admits(field, |value, field| value.as_str() == field)
    }
}

impl InstanceFilter {
    /// Check a rule's instance against this filter.
    pub fn matches(&self, field: Option<&Instance>) -> bool {
        self.admits(field, IdName::designates)
    }
}

/// Resolve a name-valued dimension.
///
/// An empty name counts as not supplied. When a name is given without an
/// explicit `include_default`, absent-dimension rules are included.
///
/// # Example
/// ```
/// use georule_admin::filter::{resolve_text, DimensionFilter};
///
/// assert_eq!(resolve_text(None, None), DimensionFilter::Any);
/// assert_eq!(resolve_text(None, Some(true)), DimensionFilter::Default);
/// assert_eq!(resolve_text(Some("WMS"), Some(false)), DimensionFilter::exact("WMS"));
/// ```
pub fn resolve_text(name: Option<&str>, include_default: Option<bool>) -> TextFilter {
    match name.filter(|name| !name.is_empty()) {
        Some(name) => DimensionFilter::Value {
            value: name.to_string(),
            include_default: include_default.unwrap_or(true),
        },
        None => special(include_default),
    }
}

/// Resolve an id-or-name dimension.
///
/// Supplying both an id and a name is rejected.
///
/// # Example
/// ```
/// use georule_admin::filter::{resolve_id_name, DimensionFilter};
/// use georule_admin::IdName;
///
/// let filter = resolve_id_name(Some(5), None, None).unwrap();
/// assert_eq!(filter, DimensionFilter::or_default(IdName::Id(5)));
///
/// assert!(resolve_id_name(Some(5), Some("x"), None).is_err());
/// ```
pub fn resolve_id_name(
    id: Option<InstanceId>,
    name: Option<&str>,
    include_default: Option<bool>,
) -> Result<InstanceFilter> {
    let value = match (id, name) {
        (Some(id), Some(name)) => {
            return Err(AdminError::validation(format!(
                "Id and name can't be both defined (id:{} name:{})",
                id, name
            )));
        }
        (Some(id), None) => IdName::Id(id),
        (None, Some(name)) => IdName::Name(name.to_string()),
        (None, None) => return Ok(special(include_default)),
    };

    Ok(DimensionFilter::Value {
        value,
        include_default: include_default.unwrap_or(true),
    })
}

fn special<V>(include_default: Option<bool>) -> DimensionFilter<V> {
    if include_default == Some(true) {
        DimensionFilter::Default
    } else {
        DimensionFilter::Any
    }
}

/// Composite filter over all rule dimensions.
///
/// # Example
/// ```
/// use georule_admin::filter::{DimensionFilter, RuleFilter};
/// use georule_admin::{GrantType, Rule};
///
/// let filter = RuleFilter::any()
///     .workspace(DimensionFilter::exact("topp"))
///     .layer(DimensionFilter::Default);
///
/// assert!(filter.matches(&Rule::new(GrantType::Allow).workspace("topp")));
/// assert!(!filter.matches(&Rule::new(GrantType::Allow).workspace("topp").layer("states")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    /// User name filter.
    pub user: TextFilter,
    /// Role name filter.
    pub role: TextFilter,
    /// Instance filter.
    pub instance: InstanceFilter,
    /// Service filter.
    pub service: TextFilter,
    /// Request filter.
    pub request: TextFilter,
    /// Workspace filter.
    pub workspace: TextFilter,
    /// Layer filter.
    pub layer: TextFilter,
}

impl RuleFilter {
    /// Create a filter that matches every rule.
    pub fn any() -> Self {
        Self::default()
    }

    /// Set the user filter.
    pub fn user(mut self, filter: TextFilter) -> Self {
        self.user = filter;
        self
    }

    /// Set the role filter.
    pub fn role(mut self, filter: TextFilter) -> Self {
        self.role = filter;
        self
    }

    /// Set the instance filter.
    pub fn instance(mut self, filter: InstanceFilter) -> Self {
        self.instance = filter;
        self
    }

    /// Set the service filter.
    pub fn service(mut self, filter: TextFilter) -> Self {
        self.service = filter;
        self
    }

    /// Set the request filter.
    pub fn request(mut self, filter: TextFilter) -> Self {
        self.request = filter;
        self
    }

    /// Set the workspace filter.
    pub fn workspace(mut self, filter: TextFilter) -> Self {
        self.workspace = filter;
        self
    }

    /// Set the layer filter.
    pub fn layer(mut self, filter: TextFilter) -> Self {
        self.layer = filter;
        self
    }

    /// Check if a rule passes every dimension filter.
    #[inline]
    pub fn matches(&self, rule: &Rule) -> bool {
        self.user.matches(rule.username.as_deref())
            && self.role.matches(rule.rolename.as_deref())
            && self.instance.matches(rule.instance.as_ref())
            && self.service.matches(rule.service.as_deref())
            && self.request.matches(rule.request.as_deref())
            && self.workspace.matches(rule.workspace.as_deref())
            && self.layer.matches(rule.layer.as_deref())
    }
}

/// Raw per-dimension filter parameters, as received from a query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// User name.
    pub user: Option<String>,
    /// Include rules without a user.
    pub user_default: Option<bool>,
    /// Role name.
    pub role: Option<String>,
    /// Include rules without a role.
    pub role_default: Option<bool>,
    /// Instance id.
    pub instance_id: Option<InstanceId>,
    /// Instance name.
    pub instance_name: Option<String>,
    /// Include rules without an instance.
    pub instance_default: Option<bool>,
    /// Service name.
    pub service: Option<String>,
    /// Include rules without a service.
    pub service_default: Option<bool>,
    /// Request name.
    pub request: Option<String>,
    /// Include rules without a request.
    pub request_default: Option<bool>,
    /// Workspace name.
    pub workspace: Option<String>,
    /// Include rules without a workspace.
    pub workspace_default: Option<bool>,
    /// Layer name.
    pub layer: Option<String>,
    /// Include rules without a layer.
    pub layer_default: Option<bool>,
}

impl FilterParams {
    /// Build the composite filter.
    pub fn resolve(&self) -> Result<RuleFilter> {
        Ok(RuleFilter {
            user: resolve_text(self.user.as_deref(), self.user_default),
            role: resolve_text(self.role.as_deref(), self.role_default),
            instance: resolve_id_name(
                self.instance_id,
                self.instance_name.as_deref(),
                self.instance_default,
            )?,
            service: resolve_text(self.service.as_deref(), self.service_default),
            request: resolve_text(self.request.as_deref(), self.request_default),
            workspace: resolve_text(self.workspace.as_deref(), self.workspace_default),
            layer: resolve_text(self.layer.as_deref(), self.layer_default),
        })
    }
}

/// A page of results: zero-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page number.
    pub number: usize,
    /// Entries per page.
    pub size: usize,
}

impl Page {
    /// Create a page selector.
    pub fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    /// Index of the first entry on this page.
    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }
}
