//! Rule definitions and the per-layer attachments owned by a rule.
//!
//! A [`Rule`] is keyed by seven dimensions: user, role, instance, service,
//! request, workspace and layer. A dimension left as `None` is a wildcard when
//! the rule is evaluated and the *default case* for administrative filters
//! (see [`crate::filter`]).
//!
//! - **Priority**: unique across the store, lower = evaluated first
//! - **Grant**: `ALLOW`, `DENY` or `LIMIT`
//! - **Layer details**: styles, attributes, CQL filters and area for `ALLOW` rules
//! - **Limits**: catalog mode and allowed area for `LIMIT` rules

use geo_types::{MultiPolygon, Rect};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::error::{AdminError, Result};

/// Rule identifier, assigned by the store on insertion.
pub type RuleId = u64;

/// Network instance identifier.
pub type InstanceId = u64;

/// Access granted when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
    /// Access is allowed, possibly narrowed by [`LayerDetails`].
    #[serde(alias = "ALLOW")]
    Allow,
    /// Access is denied.
    #[serde(alias = "DENY")]
    Deny,
    /// Access is limited by [`RuleLimits`]; evaluation continues.
    #[serde(alias = "LIMIT")]
    Limit,
}

/// How a restricted layer shows up in capabilities documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// Hide the layer entirely.
    #[default]
    #[serde(alias = "HIDE")]
    Hide,
    /// List the layer but challenge on access.
    #[serde(alias = "CHALLENGE")]
    Challenge,
    /// Hide in listings, challenge on direct access.
    #[serde(alias = "MIXED")]
    Mixed,
}

/// Kind of layer a set of details applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    /// Feature layer.
    #[serde(alias = "VECTOR")]
    Vector,
    /// Coverage layer.
    #[serde(alias = "RASTER")]
    Raster,
    /// Layer group.
    #[serde(alias = "LAYERGROUP")]
    LayerGroup,
}

/// Access level for a single feature attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeAccess {
    /// Attribute is not exposed.
    #[serde(alias = "NONE")]
    None,
    /// Attribute can be read.
    #[serde(alias = "READONLY")]
    ReadOnly,
    /// Attribute can be read and written.
    #[serde(alias = "READWRITE")]
    ReadWrite,
}

/// Access rule for one attribute of a layer. Unique by name within a
/// [`LayerDetails`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAttribute {
    /// Attribute name.
    pub name: String,
    /// Attribute data type (binding class name or similar).
    #[serde(default)]
    pub datatype: Option<String>,
    /// Access level.
    pub access: AttributeAccess,
}

impl LayerAttribute {
    /// Create an attribute rule without a data type.
    pub fn new(name: impl Into<String>, access: AttributeAccess) -> Self {
        Self {
            name: name.into(),
            datatype: None,
            access,
        }
    }

    /// Set the data type.
    pub fn datatype(mut self, datatype: impl Into<String>) -> Self {
        self.datatype = Some(datatype.into());
        self
    }
}

/// A registered network instance (a data server a rule can be scoped to).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    /// Instance id.
    pub id: InstanceId,
    /// Unique instance name.
    pub name: String,
}

/// Reference to an instance by id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdName {
    /// Reference by id.
    Id(InstanceId),
    /// Reference by name.
    Name(String),
}

impl IdName {
    /// Check whether the reference designates the given instance.
    pub fn designates(&self, instance: &Instance) -> bool {
        match self {
            Self::Id(id) => instance.id == *id,
            Self::Name(name) => instance.name == *name,
        }
    }
}

/// Per-layer constraints attached to an `ALLOW` rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerDetails {
    /// Layer type classifier.
    pub layer_type: Option<LayerType>,
    /// Default style name.
    pub default_style: Option<String>,
    /// CQL filter applied to reads.
    pub cql_filter_read: Option<String>,
    /// CQL filter applied to writes.
    pub cql_filter_write: Option<String>,
    /// Area outside of which data is not served.
    pub area: Option<MultiPolygon<f64>>,
    /// Catalog mode.
    pub catalog_mode: Option<CatalogMode>,
    /// Style names the caller may request. Empty means no restriction.
    pub allowed_styles: BTreeSet<String>,
    /// Attribute rules, unique by name, in insertion order.
    pub attributes: Vec<LayerAttribute>,
}

impl LayerDetails {
    /// Look up an attribute rule by name.
    pub fn attribute(&self, name: &str) -> Option<&LayerAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Limits attached to a `LIMIT` rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleLimits {
    /// Catalog mode.
    pub catalog_mode: Option<CatalogMode>,
    /// Area the caller is restricted to.
    pub allowed_area: Option<MultiPolygon<f64>>,
}

/// An access rule.
///
/// Built with the setter chain below and handed to the store, which assigns
/// `id` and `priority`.
///
/// # Example
/// ```
/// use georule_admin::{GrantType, Rule};
///
/// let rule = Rule::new(GrantType::Allow)
///     .rolename("ROLE_EDITOR")
///     .workspace("topp")
///     .layer("states");
///
/// assert_eq!(rule.layer.as_deref(), Some("states"));
/// assert!(rule.username.is_none()); // any user
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Rule id.
    pub id: RuleId,
    /// Evaluation priority.
    pub priority: u64,
    /// Access grant.
    pub grant: GrantType,
    /// User name.
    pub username: Option<String>,
    /// Role name.
    pub rolename: Option<String>,
    /// Network instance.
    pub instance: Option<Instance>,
    /// OGC service (WMS, WFS, ...).
    pub service: Option<String>,
    /// Service request (GetMap, GetFeature, ...).
    pub request: Option<String>,
    /// Workspace name.
    pub workspace: Option<String>,
    /// Layer name.
    pub layer: Option<String>,
    /// Source address range.
    pub address_range: Option<IpNetwork>,
    /// Bounding box.
    pub bbox: Option<Rect<f64>>,
    /// Limits, for `LIMIT` rules.
    pub limits: Option<RuleLimits>,
    /// Layer details, for `ALLOW` rules.
    pub details: Option<LayerDetails>,
}

impl Rule {
    /// Create a rule with the given grant that matches everything.
    pub fn new(grant: GrantType) -> Self {
        Self {
            id: 0,
            priority: 0,
            grant,
            username: None,
            rolename: None,
            instance: None,
            service: None,
            request: None,
            workspace: None,
            layer: None,
            address_range: None,
            bbox: None,
            limits: None,
            details: None,
        }
    }

    /// Set the user name.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the role name.
    pub fn rolename(mut self, rolename: impl Into<String>) -> Self {
        self.rolename = Some(rolename.into());
        self
    }

    /// Set the instance.
    pub fn instance(mut self, instance: Instance) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Set the service.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Set the request.
    pub fn request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    /// Set the workspace.
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// Set the layer.
    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the source address range.
    pub fn address_range(mut self, range: IpNetwork) -> Self {
        self.address_range = Some(range);
        self
    }

    /// Set the bounding box.
    pub fn bbox(mut self, bbox: Rect<f64>) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Whether layer details may be attached: `ALLOW` rules on a fixed layer.
    pub fn accepts_details(&self) -> bool {
        self.grant == GrantType::Allow && self.layer.is_some()
    }

    /// Whether limits may be attached: `LIMIT` rules only.
    pub fn accepts_limits(&self) -> bool {
        self.grant == GrantType::Limit
    }
}

/// Parse a source address range.
///
/// Accepts a CIDR network (`10.0.0.0/8`) or a single address, which becomes
/// a host network (`/32` or `/128`).
///
/// # Example
/// ```
/// use georule_admin::rule::parse_address_range;
///
/// let net = parse_address_range("192.168.1.0/24").unwrap();
/// assert_eq!(net.prefix(), 24);
///
/// let host = parse_address_range("10.0.0.1").unwrap();
/// assert_eq!(host.prefix(), 32);
/// ```
pub fn parse_address_range(s: &str) -> Result<IpNetwork> {
    let s = s.trim();

    if s.contains('/') {
        return s
            .parse::<IpNetwork>()
            .map_err(|e| AdminError::validation(format!("Invalid CIDR '{}': {}", s, e)));
    }

    s.parse::<IpAddr>()
        .map(IpNetwork::from)
        .map_err(|e| AdminError::validation(format!("Invalid IP address '{}': {}", s, e)))
}
