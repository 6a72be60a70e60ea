//! The administration facade.
//!
//! [`RuleAdmin`] runs each administrative operation as one transaction on a
//! shared [`RuleStore`]: insert, update, delete, shift, swap, set-limits, and
//! the read side (get, search, count, view). Any error inside an operation
//! leaves the store exactly as it was.
//!
//! # Example
//! ```
//! use georule_admin::admin::{RuleAdmin, RuleDraft};
//! use georule_admin::merge::ConstraintsUpdate;
//! use georule_admin::table::InsertPosition;
//! use georule_admin::GrantType;
//!
//! let admin = RuleAdmin::new();
//!
//! let id = admin
//!     .insert(
//!         RuleDraft::new(GrantType::Allow).workspace("topp").layer("states"),
//!         Some(InsertPosition::FromEnd(0)),
//!         Some(ConstraintsUpdate::new().cql_filter_read("PERSONS > 1000")),
//!     )
//!     .unwrap();
//!
//! let rule = admin.get(id).unwrap();
//! let details = rule.details.unwrap();
//! assert_eq!(details.cql_filter_read.as_deref(), Some("PERSONS > 1000"));
//! ```

use geo_types::Rect;
use ipnetwork::IpNetwork;

use crate::error::{AdminError, Result};
use crate::filter::{Page, RuleFilter};
use crate::geometry;
use crate::merge::{merge_details, ConstraintsUpdate, Patch};
use crate::rule::{
    CatalogMode, GrantType, IdName, Instance, InstanceId, Rule, RuleId, RuleLimits,
};
use crate::store::RuleStore;
use crate::table::{InsertPosition, RuleTable};
use crate::view::RuleView;

/// Largest page size accepted by [`RuleAdmin::search`] unless configured.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// A rule to be inserted.
///
/// Empty text counts as an absent dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDraft {
    /// Grant. Required.
    pub grant: Option<GrantType>,
    /// User name.
    pub username: Option<String>,
    /// Role name.
    pub rolename: Option<String>,
    /// Instance reference, resolved against the registry.
    pub instance: Option<IdName>,
    /// Service.
    pub service: Option<String>,
    /// Request.
    pub request: Option<String>,
    /// Workspace.
    pub workspace: Option<String>,
    /// Layer.
    pub layer: Option<String>,
    /// Source address range.
    pub address_range: Option<IpNetwork>,
    /// Bounding box.
    pub bbox: Option<Rect<f64>>,
}

impl RuleDraft {
    /// Start a draft with a grant.
    pub fn new(grant: GrantType) -> Self {
        Self {
            grant: Some(grant),
            ..Self::default()
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

    /// Set the instance reference.
    pub fn instance(mut self, instance: IdName) -> Self {
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

    fn into_rule(self, grant: GrantType, instance: Option<Instance>) -> Rule {
        Rule {
            username: non_empty(self.username),
            rolename: non_empty(self.rolename),
            instance,
            service: non_empty(self.service),
            request: non_empty(self.request),
            workspace: non_empty(self.workspace),
            layer: non_empty(self.layer),
            address_range: self.address_range,
            bbox: self.bbox,
            ..Rule::new(grant)
        }
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.is_empty())
}

/// Partial update of a rule. Unset fields are left alone.
///
/// For the text dimensions, `Set("")` clears the field like `Clear` does.
/// `position` exists so that callers forwarding raw input can have a position
/// change rejected. Priorities only move through shift and swap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePatch {
    /// Must be `None`.
    pub position: Option<InsertPosition>,
    /// New grant.
    pub grant: Option<GrantType>,
    /// User name.
    pub username: Patch<String>,
    /// Role name.
    pub rolename: Patch<String>,
    /// Instance reference.
    pub instance: Patch<IdName>,
    /// Service.
    pub service: Patch<String>,
    /// Request.
    pub request: Patch<String>,
    /// Workspace.
    pub workspace: Patch<String>,
    /// Layer.
    pub layer: Patch<String>,
    /// Source address range.
    pub address_range: Patch<IpNetwork>,
    /// Bounding box.
    pub bbox: Patch<Rect<f64>>,
}

impl RulePatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the grant.
    pub fn grant(mut self, grant: GrantType) -> Self {
        self.grant = Some(grant);
        self
    }

    /// Set or clear (empty text) the user name.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Patch::Set(username.into());
        self
    }

    /// Set or clear (empty text) the role name.
    pub fn rolename(mut self, rolename: impl Into<String>) -> Self {
        self.rolename = Patch::Set(rolename.into());
        self
    }

    /// Set or clear the instance.
    pub fn instance(mut self, instance: Option<IdName>) -> Self {
        self.instance = match instance {
            Some(reference) => Patch::Set(reference),
            None => Patch::Clear,
        };
        self
    }

    /// Set or clear (empty text) the service.
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Patch::Set(service.into());
        self
    }

    /// Set or clear (empty text) the request.
    pub fn request(mut self, request: impl Into<String>) -> Self {
        self.request = Patch::Set(request.into());
        self
    }

    /// Set or clear (empty text) the workspace.
    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Patch::Set(workspace.into());
        self
    }

    /// Set or clear (empty text) the layer.
    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Patch::Set(layer.into());
        self
    }

    /// Set or clear the address range.
    pub fn address_range(mut self, range: Option<IpNetwork>) -> Self {
        self.address_range = range.map_or(Patch::Clear, Patch::Set);
        self
    }

    /// Set or clear the bounding box.
    pub fn bbox(mut self, bbox: Option<Rect<f64>>) -> Self {
        self.bbox = bbox.map_or(Patch::Clear, Patch::Set);
        self
    }

    /// Apply the rule-level fields. Returns `true` if anything changed.
    fn apply(&self, table: &RuleTable, rule: &mut Rule) -> Result<bool> {
        let mut changed = false;

        if let Some(grant) = self.grant {
            if rule.grant != grant {
                rule.grant = grant;
                changed = true;
            }
        }

        changed |= text_patch(&self.username).apply_to(&mut rule.username);
        changed |= text_patch(&self.rolename).apply_to(&mut rule.rolename);
        changed |= text_patch(&self.service).apply_to(&mut rule.service);
        changed |= text_patch(&self.request).apply_to(&mut rule.request);
        changed |= text_patch(&self.workspace).apply_to(&mut rule.workspace);
        changed |= text_patch(&self.layer).apply_to(&mut rule.layer);

        let instance = match &self.instance {
            Patch::Unset => Patch::Unset,
            Patch::Clear => Patch::Clear,
            Patch::Set(reference) => Patch::Set(table.resolve_instance(reference)?),
        };
        changed |= instance.apply_to(&mut rule.instance);
        changed |= self.address_range.clone().apply_to(&mut rule.address_range);
        changed |= self.bbox.clone().apply_to(&mut rule.bbox);

        Ok(changed)
    }
}

fn text_patch(patch: &Patch<String>) -> Patch<String> {
    match patch {
        Patch::Set(text) if text.is_empty() => Patch::Clear,
        other => other.clone(),
    }
}

/// New limits for a `LIMIT` rule.
///
/// The catalog mode always replaces the stored one. The allowed area is
/// replaced only when WKT is supplied; otherwise the stored area is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitsUpdate {
    /// Catalog mode.
    pub catalog_mode: Option<CatalogMode>,
    /// Allowed area as WKT.
    pub allowed_area: Option<String>,
}

/// Builder for [`RuleAdmin`].
#[derive(Debug, Default)]
pub struct RuleAdminBuilder {
    table: Option<RuleTable>,
    max_page_size: Option<usize>,
}

impl RuleAdminBuilder {
    /// Start from an existing table.
    pub fn table(mut self, table: RuleTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Set the largest accepted page size.
    pub fn max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Build the facade.
    pub fn build(self) -> RuleAdmin {
        RuleAdmin {
            store: RuleStore::from_table(self.table.unwrap_or_default()),
            max_page_size: self.max_page_size.unwrap_or(DEFAULT_MAX_PAGE_SIZE),
        }
    }
}

/// Transactional rule administration over a shared store.
///
/// Cloning is cheap and clones share the same store.
#[derive(Debug, Clone)]
pub struct RuleAdmin {
    store: RuleStore,
    max_page_size: usize,
}

impl Default for RuleAdmin {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RuleAdmin {
    /// Create a facade over an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder.
    pub fn builder() -> RuleAdminBuilder {
        RuleAdminBuilder::default()
    }

    /// Largest accepted page size.
    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Register a network instance and return its id.
    pub fn register_instance(&self, name: &str) -> Result<InstanceId> {
        let result = self
            .store
            .transaction(|table| table.register_instance(name));
        if let Ok(id) = &result {
            tracing::info!(instance_id = id, name, "Instance registered");
        }
        rejected("register_instance", result)
    }

    /// Registered instances, by id.
    pub fn instances(&self) -> Vec<Instance> {
        self.store.read(|table| table.instances().cloned().collect())
    }

    /// Insert a rule at a position, optionally with layer details.
    ///
    /// Fails with a validation error when the position or grant is missing,
    /// or when details are given for a rule that cannot carry them.
    pub fn insert(
        &self,
        draft: RuleDraft,
        position: Option<InsertPosition>,
        constraints: Option<ConstraintsUpdate>,
    ) -> Result<RuleId> {
        let result = self.insert_inner(draft, position, constraints);
        rejected("insert", result)
    }

    fn insert_inner(
        &self,
        draft: RuleDraft,
        position: Option<InsertPosition>,
        constraints: Option<ConstraintsUpdate>,
    ) -> Result<RuleId> {
        let position = position.ok_or_else(|| AdminError::validation("Missing insert position"))?;
        let grant = draft
            .grant
            .ok_or_else(|| AdminError::validation("Missing grant type"))?;

        let (id, priority) = self.store.transaction(|table| -> Result<(RuleId, u64)> {
            let instance = draft
                .instance
                .as_ref()
                .map(|reference| table.resolve_instance(reference))
                .transpose()?;

            let id = table.insert(draft.into_rule(grant, instance), position)?;

            if let Some(update) = &constraints {
                let outcome = merge_details(None, update)?;
                table.set_details(id, Some(outcome.details))?;
            }

            Ok((id, table.get(id)?.priority))
        })?;

        tracing::info!(
            rule_id = id,
            priority,
            grant = ?grant,
            with_details = constraints.is_some(),
            "Rule inserted"
        );
        Ok(id)
    }

    /// Apply a partial update to a rule and, optionally, to its details.
    ///
    /// Nothing is written when no supplied field produces a different value.
    pub fn update(
        &self,
        id: RuleId,
        patch: RulePatch,
        constraints: Option<ConstraintsUpdate>,
    ) -> Result<()> {
        let result = self.update_inner(id, patch, constraints);
        rejected("update", result)
    }

    fn update_inner(
        &self,
        id: RuleId,
        patch: RulePatch,
        constraints: Option<ConstraintsUpdate>,
    ) -> Result<()> {
        if let Some(position) = patch.position {
            return Err(AdminError::validation(format!(
                "Position can't be updated (got {:?})",
                position
            )));
        }

        let (rule_changed, details_changed) = self.store.transaction(|table| -> Result<_> {
            let mut rule = table.get(id)?.clone();
            let rule_changed = patch.apply(table, &mut rule)?;
            if rule_changed {
                table.update(rule)?;
            }

            let mut details_changed = false;
            if let Some(update) = &constraints {
                // Merge against the stored details, which the update may have dropped.
                let outcome = merge_details(table.get(id)?.details.as_ref(), update)?;
                if outcome.changed {
                    table.set_details(id, Some(outcome.details))?;
                    details_changed = true;
                }
            }

            Ok((rule_changed, details_changed))
        })?;

        if rule_changed || details_changed {
            tracing::info!(rule_id = id, rule_changed, details_changed, "Rule updated");
        } else {
            tracing::debug!(rule_id = id, "Rule not changed");
        }
        Ok(())
    }

    /// Delete a rule. Returns `false` if there was nothing to delete.
    pub fn delete(&self, id: RuleId) -> bool {
        let removed = self.store.write(|table| table.delete(id));
        if removed {
            tracing::info!(rule_id = id, "Rule deleted");
        } else {
            tracing::warn!(rule_id = id, "Rule not found for deletion");
        }
        removed
    }

    /// Get a copy of a rule.
    pub fn get(&self, id: RuleId) -> Result<Rule> {
        let result = self.store.read(|table| table.get(id).cloned());
        rejected("get", result)
    }

    /// Get the outward view of a rule.
    pub fn view(&self, id: RuleId) -> Result<RuleView> {
        let result = self.store.read(|table| table.get(id).map(RuleView::from));
        rejected("view", result)
    }

    /// Move every rule at or above `threshold` up by `amount`.
    pub fn shift(&self, threshold: u64, amount: i64) -> Result<usize> {
        let result = self
            .store
            .transaction(|table| table.shift(threshold, amount));
        if let Ok(moved) = &result {
            tracing::info!(threshold, amount, moved, "Rules shifted");
        }
        rejected("shift", result)
    }

    /// Exchange the priorities of two rules.
    pub fn swap(&self, a: RuleId, b: RuleId) -> Result<()> {
        let result = self.store.transaction(|table| table.swap(a, b));
        if result.is_ok() {
            tracing::info!(a, b, "Rules swapped");
        }
        rejected("swap", result)
    }

    /// Replace the limits of a `LIMIT` rule.
    pub fn set_limits(&self, id: RuleId, update: LimitsUpdate) -> Result<()> {
        let result = self.set_limits_inner(id, update);
        rejected("set_limits", result)
    }

    fn set_limits_inner(&self, id: RuleId, update: LimitsUpdate) -> Result<()> {
        let area = update
            .allowed_area
            .as_deref()
            .map(geometry::parse_area)
            .transpose()?;

        self.store.transaction(|table| -> Result<()> {
            let kept_area = table
                .get(id)?
                .limits
                .as_ref()
                .and_then(|limits| limits.allowed_area.clone());

            let limits = RuleLimits {
                catalog_mode: update.catalog_mode,
                allowed_area: area.or(kept_area),
            };
            table.set_limits(id, Some(limits))
        })?;

        tracing::info!(rule_id = id, catalog_mode = ?update.catalog_mode, "Rule limits set");
        Ok(())
    }

    /// Rules matching a filter in ascending priority, optionally paged.
    pub fn search(&self, filter: &RuleFilter, page: Option<Page>) -> Result<Vec<Rule>> {
        if let Some(page) = page {
            if page.size == 0 || page.size > self.max_page_size {
                return rejected(
                    "search",
                    Err(AdminError::validation(format!(
                        "Page size must be between 1 and {}, got {}",
                        self.max_page_size, page.size
                    ))),
                );
            }
        }
        Ok(self.store.read(|table| table.search(filter, page)))
    }

    /// Number of rules matching a filter.
    pub fn count(&self, filter: &RuleFilter) -> u64 {
        self.store.read(|table| table.count(filter))
    }

    /// Total number of rules.
    pub fn count_all(&self) -> u64 {
        self.store.read(|table| table.len() as u64)
    }
}

fn rejected<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(error) = &result {
        tracing::warn!(operation, %error, "Rule administration request rejected");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DimensionFilter;
    use crate::rule::{AttributeAccess, LayerAttribute};

    fn allow_layer(layer: &str) -> RuleDraft {
        RuleDraft::new(GrantType::Allow).layer(layer)
    }

    #[test]
    fn test_insert_requires_position_and_grant() {
        let admin = RuleAdmin::new();
        assert!(admin
            .insert(allow_layer("a"), None, None)
            .unwrap_err()
            .is_validation());
        assert!(admin
            .insert(RuleDraft::default(), Some(InsertPosition::Fixed(0)), None)
            .unwrap_err()
            .is_validation());
        assert_eq!(admin.count_all(), 0);
    }

    #[test]
    fn test_insert_normalizes_empty_text() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(
                RuleDraft::new(GrantType::Deny).username("").service("WMS"),
                Some(InsertPosition::Fixed(0)),
                None,
            )
            .unwrap();
        let rule = admin.get(id).unwrap();
        assert!(rule.username.is_none());
        assert_eq!(rule.service.as_deref(), Some("WMS"));
    }

    #[test]
    fn test_insert_resolves_instance() {
        let admin = RuleAdmin::new();
        let instance_id = admin.register_instance("gs-main").unwrap();

        let id = admin
            .insert(
                allow_layer("a").instance(IdName::Name("gs-main".to_string())),
                Some(InsertPosition::Fixed(0)),
                None,
            )
            .unwrap();
        assert_eq!(admin.get(id).unwrap().instance.unwrap().id, instance_id);

        let err = admin
            .insert(
                allow_layer("b").instance(IdName::Id(99)),
                Some(InsertPosition::Fixed(0)),
                None,
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(admin.count_all(), 1);
        assert_eq!(admin.get(id).unwrap().priority, 0);
    }

    #[test]
    fn test_insert_with_details_defaults_catalog_mode() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(
                allow_layer("states"),
                Some(InsertPosition::Fixed(0)),
                Some(ConstraintsUpdate::new().default_style("population")),
            )
            .unwrap();
        let details = admin.get(id).unwrap().details.unwrap();
        assert_eq!(details.catalog_mode, Some(CatalogMode::Hide));
        assert_eq!(details.default_style.as_deref(), Some("population"));
    }

    #[test]
    fn test_insert_details_on_deny_rolls_back() {
        let admin = RuleAdmin::new();
        let first = admin
            .insert(allow_layer("a"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();

        let err = admin
            .insert(
                RuleDraft::new(GrantType::Deny).layer("a"),
                Some(InsertPosition::Fixed(0)),
                Some(ConstraintsUpdate::new().default_style("x")),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(admin.count_all(), 1);
        assert_eq!(admin.get(first).unwrap().priority, 0);
    }

    #[test]
    fn test_update_rejects_position() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(allow_layer("a"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();
        let patch = RulePatch {
            position: Some(InsertPosition::Fixed(3)),
            ..RulePatch::new()
        };
        assert!(admin.update(id, patch, None).unwrap_err().is_validation());
        assert!(admin
            .update(42, RulePatch::new(), None)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_update_fields_and_clear_with_empty_text() {
        let admin = RuleAdmin::new();
        admin.register_instance("gs-main").unwrap();
        let id = admin
            .insert(
                allow_layer("a").rolename("ROLE_X").workspace("topp"),
                Some(InsertPosition::Fixed(5)),
                None,
            )
            .unwrap();

        admin
            .update(
                id,
                RulePatch::new()
                    .rolename("")
                    .service("WFS")
                    .instance(Some(IdName::Name("gs-main".to_string()))),
                None,
            )
            .unwrap();

        let rule = admin.get(id).unwrap();
        assert!(rule.rolename.is_none());
        assert_eq!(rule.service.as_deref(), Some("WFS"));
        assert_eq!(rule.workspace.as_deref(), Some("topp"));
        assert_eq!(rule.instance.as_ref().map(|i| i.name.as_str()), Some("gs-main"));
        assert_eq!(rule.priority, 5);

        admin
            .update(id, RulePatch::new().instance(None), None)
            .unwrap();
        assert!(admin.get(id).unwrap().instance.is_none());
    }

    #[test]
    fn test_update_merges_constraints() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(
                allow_layer("states"),
                Some(InsertPosition::Fixed(0)),
                Some(ConstraintsUpdate::new().attributes(vec![
                    LayerAttribute::new("A", AttributeAccess::ReadWrite),
                    LayerAttribute::new("C", AttributeAccess::ReadOnly),
                ])),
            )
            .unwrap();

        admin
            .update(
                id,
                RulePatch::new(),
                Some(ConstraintsUpdate::new().attributes(vec![
                    LayerAttribute::new("A", AttributeAccess::ReadOnly),
                    LayerAttribute::new("B", AttributeAccess::ReadWrite),
                ])),
            )
            .unwrap();

        let details = admin.get(id).unwrap().details.unwrap();
        assert_eq!(details.attributes.len(), 2);
        assert_eq!(details.attribute("A").unwrap().access, AttributeAccess::ReadOnly);
        assert_eq!(details.attribute("B").unwrap().access, AttributeAccess::ReadWrite);
        assert!(details.attribute("C").is_none());
    }

    #[test]
    fn test_update_drops_attachments_that_no_longer_apply() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(
                allow_layer("states"),
                Some(InsertPosition::Fixed(0)),
                Some(ConstraintsUpdate::new().default_style("population")),
            )
            .unwrap();

        admin
            .update(id, RulePatch::new().grant(GrantType::Deny).layer(""), None)
            .unwrap();
        let rule = admin.get(id).unwrap();
        assert_eq!(rule.grant, GrantType::Deny);
        assert!(rule.layer.is_none());
        assert!(rule.details.is_none());
        assert!(admin.view(id).unwrap().constraints.is_none());

        // Constraints on a rule that can't carry them are still refused.
        assert!(admin
            .update(id, RulePatch::new(), Some(ConstraintsUpdate::new().default_style("x")))
            .unwrap_err()
            .is_validation());

        // Back to ALLOW on a layer, the same update starts from fresh details.
        admin
            .update(
                id,
                RulePatch::new().grant(GrantType::Allow).layer("roads"),
                Some(ConstraintsUpdate::new().default_style("x")),
            )
            .unwrap();
        let details = admin.get(id).unwrap().details.unwrap();
        assert_eq!(details.default_style.as_deref(), Some("x"));

        let limit = admin
            .insert(RuleDraft::new(GrantType::Limit), Some(InsertPosition::Fixed(1)), None)
            .unwrap();
        admin
            .set_limits(
                limit,
                LimitsUpdate {
                    catalog_mode: Some(CatalogMode::Hide),
                    allowed_area: None,
                },
            )
            .unwrap();
        admin
            .update(limit, RulePatch::new().grant(GrantType::Allow), None)
            .unwrap();
        assert!(admin.get(limit).unwrap().limits.is_none());
    }

    #[test]
    fn test_update_with_empty_constraints_creates_no_details() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(allow_layer("states"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();

        admin
            .update(id, RulePatch::new(), Some(ConstraintsUpdate::new()))
            .unwrap();
        assert!(admin.get(id).unwrap().details.is_none());
        assert!(admin.view(id).unwrap().constraints.is_none());
    }

    #[test]
    fn test_update_bad_wkt_rolls_back_rule_change() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(allow_layer("states"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();

        let err = admin
            .update(
                id,
                RulePatch::new().workspace("topp"),
                Some(ConstraintsUpdate::new().restricted_area("POLYGON((broken")),
            )
            .unwrap_err();
        assert!(err.is_format());

        let rule = admin.get(id).unwrap();
        assert!(rule.workspace.is_none());
        assert!(rule.details.is_none());
    }

    #[test]
    fn test_set_limits_keeps_area_without_wkt() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(
                RuleDraft::new(GrantType::Limit),
                Some(InsertPosition::Fixed(0)),
                None,
            )
            .unwrap();

        admin
            .set_limits(
                id,
                LimitsUpdate {
                    catalog_mode: Some(CatalogMode::Mixed),
                    allowed_area: Some("POLYGON((0 0, 2 0, 2 2, 0 2, 0 0))".to_string()),
                },
            )
            .unwrap();
        admin
            .set_limits(
                id,
                LimitsUpdate {
                    catalog_mode: Some(CatalogMode::Challenge),
                    allowed_area: None,
                },
            )
            .unwrap();

        let limits = admin.get(id).unwrap().limits.unwrap();
        assert_eq!(limits.catalog_mode, Some(CatalogMode::Challenge));
        assert!(limits.allowed_area.is_some());

        let allow = admin
            .insert(allow_layer("a"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();
        assert!(admin
            .set_limits(allow, LimitsUpdate::default())
            .unwrap_err()
            .is_validation());
        assert!(admin
            .set_limits(id, LimitsUpdate {
                catalog_mode: None,
                allowed_area: Some("POINT(1 1)".to_string()),
            })
            .unwrap_err()
            .is_format());
    }

    #[test]
    fn test_search_validates_page_size() {
        let admin = RuleAdmin::builder().max_page_size(10).build();
        for layer in ["a", "b", "a"] {
            admin
                .insert(allow_layer(layer), Some(InsertPosition::FromEnd(0)), None)
                .unwrap();
        }

        let filter = RuleFilter::any().layer(DimensionFilter::exact("a"));
        assert_eq!(admin.search(&filter, None).unwrap().len(), 2);
        assert_eq!(admin.count(&filter), 2);
        assert_eq!(admin.search(&filter, Some(Page::new(0, 1))).unwrap().len(), 1);

        assert!(admin
            .search(&filter, Some(Page::new(0, 0)))
            .unwrap_err()
            .is_validation());
        assert!(admin
            .search(&filter, Some(Page::new(0, 11)))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_delete_and_view() {
        let admin = RuleAdmin::new();
        let id = admin
            .insert(allow_layer("a"), Some(InsertPosition::Fixed(0)), None)
            .unwrap();
        assert_eq!(admin.view(id).unwrap().layer.as_deref(), Some("a"));
        assert!(admin.delete(id));
        assert!(!admin.delete(id));
        assert!(admin.view(id).unwrap_err().is_not_found());
    }
}
