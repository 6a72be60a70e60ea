//! Serializable summaries of stored rules.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::geometry;
use crate::rule::{
    CatalogMode, GrantType, Instance, LayerAttribute, LayerDetails, LayerType, Rule, RuleId,
    RuleLimits,
};

/// Outward view of a rule and its effective constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    /// Rule id.
    pub id: RuleId,
    /// Priority.
    pub priority: u64,
    /// Grant.
    pub grant: GrantType,
    /// User name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Role name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolename: Option<String>,
    /// Instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,
    /// Address range in CIDR notation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Workspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    /// Effective constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<ConstraintsView>,
}

/// Constraints as shown in a [`RuleView`]; the area is rendered as WKT.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintsView {
    /// Allowed styles.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_styles: BTreeSet<String>,
    /// Attribute rules.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<LayerAttribute>,
    /// CQL read filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cql_filter_read: Option<String>,
    /// CQL write filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cql_filter_write: Option<String>,
    /// Default style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_style: Option<String>,
    /// Restricted area.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_area_wkt: Option<String>,
    /// Catalog mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_mode: Option<CatalogMode>,
    /// Layer type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<LayerType>,
}

impl From<&LayerDetails> for ConstraintsView {
    fn from(details: &LayerDetails) -> Self {
        Self {
            allowed_styles: details.allowed_styles.clone(),
            attributes: details.attributes.clone(),
            cql_filter_read: details.cql_filter_read.clone(),
            cql_filter_write: details.cql_filter_write.clone(),
            default_style: details.default_style.clone(),
            restricted_area_wkt: details.area.as_ref().map(geometry::area_to_wkt),
            catalog_mode: details.catalog_mode,
            layer_type: details.layer_type,
        }
    }
}

impl ConstraintsView {
    // Limits only surface through their catalog mode.
    fn from_limits(limits: &RuleLimits) -> Option<Self> {
        limits.catalog_mode.map(|mode| Self {
            catalog_mode: Some(mode),
            ..Self::default()
        })
    }
}

impl From<&Rule> for RuleView {
    fn from(rule: &Rule) -> Self {
        let constraints = match (&rule.details, &rule.limits) {
            (Some(details), _) => Some(ConstraintsView::from(details)),
            (None, Some(limits)) => ConstraintsView::from_limits(limits),
            (None, None) => None,
        };

        Self {
            id: rule.id,
            priority: rule.priority,
            grant: rule.grant,
            username: rule.username.clone(),
            rolename: rule.rolename.clone(),
            instance: rule.instance.clone(),
            ip_address: rule.address_range.map(|net| net.to_string()),
            service: rule.service.clone(),
            request: rule.request.clone(),
            workspace: rule.workspace.clone(),
            layer: rule.layer.clone(),
            constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::parse_address_range;

    #[test]
    fn test_view_prefers_details() {
        let mut rule = Rule::new(GrantType::Allow)
            .layer("states")
            .address_range(parse_address_range("10.0.0.0/8").unwrap());
        rule.details = Some(LayerDetails {
            area: Some(geometry::parse_area("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap()),
            catalog_mode: Some(CatalogMode::Mixed),
            ..LayerDetails::default()
        });
        rule.limits = Some(RuleLimits {
            catalog_mode: Some(CatalogMode::Challenge),
            allowed_area: None,
        });

        let view = RuleView::from(&rule);
        assert_eq!(view.ip_address.as_deref(), Some("10.0.0.0/8"));
        let constraints = view.constraints.unwrap();
        assert_eq!(constraints.catalog_mode, Some(CatalogMode::Mixed));
        assert!(constraints
            .restricted_area_wkt
            .unwrap()
            .starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn test_view_falls_back_to_limit_catalog_mode() {
        let mut rule = Rule::new(GrantType::Limit);
        assert!(RuleView::from(&rule).constraints.is_none());

        rule.limits = Some(RuleLimits::default());
        assert!(RuleView::from(&rule).constraints.is_none());

        rule.limits = Some(RuleLimits {
            catalog_mode: Some(CatalogMode::Hide),
            allowed_area: None,
        });
        let constraints = RuleView::from(&rule).constraints.unwrap();
        assert_eq!(constraints.catalog_mode, Some(CatalogMode::Hide));
        assert!(constraints.restricted_area_wkt.is_none());
    }

    #[test]
    fn test_view_serializes_sparse_json() {
        let rule = Rule::new(GrantType::Deny).service("WMS");
        let json = serde_json::to_value(RuleView::from(&rule)).unwrap();
        assert_eq!(json["grant"], "deny");
        assert_eq!(json["service"], "WMS");
        assert!(json.get("layer").is_none());
        assert!(json.get("constraints").is_none());
    }
}
