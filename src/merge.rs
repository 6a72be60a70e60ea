//! Partial updates of per-layer constraints.
//!
//! [`merge_details`] folds a [`ConstraintsUpdate`] into existing
//! [`LayerDetails`] (or fresh ones) field by field and reports whether
//! anything actually changed. Every field is a [`Patch`], so "leave alone",
//! "clear" and "replace" are distinct. [`ConstraintsInput`] is the serde-facing
//! form, where an empty string or empty style list means "clear".

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::geometry::{self, GeometryError};
use crate::rule::{CatalogMode, LayerAttribute, LayerDetails, LayerType};

/// A three-way field update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the field as it is.
    Unset,
    /// Clear the field.
    Clear,
    /// Replace the field.
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T: PartialEq> Patch<T> {
    /// Apply to an optional field. Returns `true` if the value changed.
    pub fn apply_to(self, slot: &mut Option<T>) -> bool {
        match self {
            Self::Unset => false,
            Self::Clear => slot.take().is_some(),
            Self::Set(value) => replace(slot, Some(value)),
        }
    }
}

impl Patch<String> {
    /// Map boundary text: absent leaves alone, empty clears, anything else sets.
    ///
    /// # Example
    /// ```
    /// use georule_admin::merge::Patch;
    ///
    /// assert_eq!(Patch::from_text(None), Patch::Unset);
    /// assert_eq!(Patch::from_text(Some(String::new())), Patch::Clear);
    /// assert_eq!(Patch::from_text(Some("x".into())), Patch::Set("x".to_string()));
    /// ```
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            None => Self::Unset,
            Some(text) if text.is_empty() => Self::Clear,
            Some(text) => Self::Set(text),
        }
    }
}

/// Partial update of a rule's layer details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintsUpdate {
    /// Allowed style names.
    pub allowed_styles: Patch<BTreeSet<String>>,
    /// Full attribute set; reconciled by name when present.
    pub attributes: Option<Vec<LayerAttribute>>,
    /// CQL read filter.
    pub cql_filter_read: Patch<String>,
    /// CQL write filter.
    pub cql_filter_write: Patch<String>,
    /// Default style.
    pub default_style: Patch<String>,
    /// Restricted area as WKT.
    pub restricted_area: Patch<String>,
    /// Catalog mode.
    pub catalog_mode: Option<CatalogMode>,
    /// Layer type.
    pub layer_type: Option<LayerType>,
}

impl ConstraintsUpdate {
    /// Create an update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed styles.
    pub fn allowed_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_styles = Patch::Set(styles.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the attribute set.
    pub fn attributes(mut self, attributes: Vec<LayerAttribute>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Set the CQL read filter.
    pub fn cql_filter_read(mut self, cql: impl Into<String>) -> Self {
        self.cql_filter_read = Patch::Set(cql.into());
        self
    }

    /// Set the CQL write filter.
    pub fn cql_filter_write(mut self, cql: impl Into<String>) -> Self {
        self.cql_filter_write = Patch::Set(cql.into());
        self
    }

    /// Set the default style.
    pub fn default_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = Patch::Set(style.into());
        self
    }

    /// Set the restricted area from WKT.
    pub fn restricted_area(mut self, wkt: impl Into<String>) -> Self {
        self.restricted_area = Patch::Set(wkt.into());
        self
    }

    /// Set the catalog mode.
    pub fn catalog_mode(mut self, mode: CatalogMode) -> Self {
        self.catalog_mode = Some(mode);
        self
    }

    /// Set the layer type.
    pub fn layer_type(mut self, layer_type: LayerType) -> Self {
        self.layer_type = Some(layer_type);
        self
    }
}

/// Result of [`merge_details`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Details after the update.
    pub details: LayerDetails,
    /// Whether any supplied field produced a different value.
    pub changed: bool,
}

/// Fold a partial update into layer details.
///
/// When `existing` is `None` the update starts from empty details whose
/// catalog mode is [`CatalogMode::Hide`] unless the update supplies one.
/// The restricted area is parsed before anything is touched, so an invalid
/// WKT leaves no partial result behind.
///
/// # Example
/// ```
/// use georule_admin::merge::{merge_details, ConstraintsUpdate};
/// use georule_admin::CatalogMode;
///
/// let update = ConstraintsUpdate::new()
///     .allowed_styles(["population"])
///     .cql_filter_read("PERSONS > 1000");
///
/// let outcome = merge_details(None, &update).unwrap();
/// assert!(outcome.changed);
/// assert_eq!(outcome.details.catalog_mode, Some(CatalogMode::Hide));
///
/// let again = merge_details(Some(&outcome.details), &update).unwrap();
/// assert!(!again.changed);
/// ```
pub fn merge_details(
    existing: Option<&LayerDetails>,
    update: &ConstraintsUpdate,
) -> Result<MergeOutcome, GeometryError> {
    let area = match &update.restricted_area {
        Patch::Unset => Patch::Unset,
        Patch::Clear => Patch::Clear,
        Patch::Set(wkt) => Patch::Set(geometry::parse_area(wkt)?),
    };

    let fresh = existing.is_none();
    let mut details = existing.cloned().unwrap_or_default();
    let mut changed = false;

    changed |= match &update.allowed_styles {
        Patch::Unset => false,
        Patch::Clear => {
            let had_styles = !details.allowed_styles.is_empty();
            details.allowed_styles.clear();
            had_styles
        }
        Patch::Set(styles) => replace(&mut details.allowed_styles, styles.clone()),
    };

    if let Some(attributes) = &update.attributes {
        changed |= reconcile_attributes(&mut details.attributes, attributes);
    }

    changed |= update.cql_filter_read.clone().apply_to(&mut details.cql_filter_read);
    changed |= update.cql_filter_write.clone().apply_to(&mut details.cql_filter_write);
    changed |= update.default_style.clone().apply_to(&mut details.default_style);
    changed |= area.apply_to(&mut details.area);

    match update.catalog_mode {
        Some(mode) => changed |= replace(&mut details.catalog_mode, Some(mode)),
        None if fresh => details.catalog_mode = Some(CatalogMode::Hide),
        None => {}
    }

    if let Some(layer_type) = update.layer_type {
        changed |= replace(&mut details.layer_type, Some(layer_type));
    }

    Ok(MergeOutcome { details, changed })
}

/// Reconcile an attribute list with the wanted set, matching by name.
///
/// Attributes whose name is wanted are updated in place and keep their
/// position; the others are dropped; wanted names not yet present are
/// appended in the order given. Afterwards `current` holds exactly the wanted
/// set by name. If a name appears twice in `wanted`, the last entry wins.
///
/// Returns `true` if anything changed.
pub fn reconcile_attributes(current: &mut Vec<LayerAttribute>, wanted: &[LayerAttribute]) -> bool {
    let by_name: HashMap<&str, &LayerAttribute> =
        wanted.iter().map(|a| (a.name.as_str(), a)).collect();
    let mut changed = false;

    current.retain_mut(|attribute| match by_name.get(attribute.name.as_str()) {
        Some(update) => {
            if attribute.datatype != update.datatype || attribute.access != update.access {
                attribute.datatype = update.datatype.clone();
                attribute.access = update.access;
                changed = true;
            }
            true
        }
        None => {
            tracing::debug!(attribute = %attribute.name, "Attribute not in update, removing");
            changed = true;
            false
        }
    });

    let mut present: HashSet<String> = current.iter().map(|a| a.name.clone()).collect();
    for attribute in wanted {
        if present.insert(attribute.name.clone()) {
            tracing::debug!(attribute = %attribute.name, "New attribute in update, adding");
            current.push(LayerAttribute::clone(by_name[attribute.name.as_str()]));
            changed = true;
        }
    }

    changed
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Serde-facing constraints, as found in configuration files or request
/// bodies. Absent fields leave the stored value alone; empty text or an empty
/// style list clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsInput {
    /// Allowed style names.
    pub allowed_styles: Option<BTreeSet<String>>,
    /// Attribute rules.
    pub attributes: Option<Vec<LayerAttribute>>,
    /// CQL read filter.
    pub cql_filter_read: Option<String>,
    /// CQL write filter.
    pub cql_filter_write: Option<String>,
    /// Default style.
    pub default_style: Option<String>,
    /// Restricted area as WKT.
    pub restricted_area_wkt: Option<String>,
    /// Catalog mode.
    pub catalog_mode: Option<CatalogMode>,
    /// Layer type.
    #[serde(rename = "type")]
    pub layer_type: Option<LayerType>,
}

impl ConstraintsInput {
    /// Convert to the tri-state update.
    pub fn into_update(self) -> ConstraintsUpdate {
        ConstraintsUpdate {
            allowed_styles: match self.allowed_styles {
                None => Patch::Unset,
                Some(styles) if styles.is_empty() => Patch::Clear,
                Some(styles) => Patch::Set(styles),
            },
            attributes: self.attributes,
            cql_filter_read: Patch::from_text(self.cql_filter_read),
            cql_filter_write: Patch::from_text(self.cql_filter_write),
            default_style: Patch::from_text(self.default_style),
            restricted_area: Patch::from_text(self.restricted_area_wkt),
            catalog_mode: self.catalog_mode,
            layer_type: self.layer_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::AttributeAccess::{ReadOnly, ReadWrite};

    const SQUARE: &str = "POLYGON((0 0, 4 0, 4 4, 0 4, 0 0))";

    fn attr(name: &str, access: crate::rule::AttributeAccess) -> LayerAttribute {
        LayerAttribute::new(name, access)
    }

    #[test]
    fn test_reconcile_attributes_by_name() {
        let mut current = vec![attr("A", ReadWrite).datatype("String"), attr("C", ReadOnly)];
        let wanted = vec![attr("A", ReadOnly).datatype("String"), attr("B", ReadWrite)];

        assert!(reconcile_attributes(&mut current, &wanted));
        assert_eq!(current, wanted);
    }

    #[test]
    fn test_reconcile_keeps_position_of_matches() {
        let mut current = vec![attr("X", ReadOnly), attr("Y", ReadOnly), attr("Z", ReadOnly)];
        let wanted = vec![attr("W", ReadOnly), attr("Z", ReadWrite), attr("X", ReadOnly)];

        assert!(reconcile_attributes(&mut current, &wanted));
        let names: Vec<&str> = current.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["X", "Z", "W"]);
        assert_eq!(current[1].access, ReadWrite);
    }

    #[test]
    fn test_reconcile_same_set_is_unchanged() {
        let mut current = vec![attr("A", ReadOnly), attr("B", ReadWrite)];
        let wanted = vec![attr("B", ReadWrite), attr("A", ReadOnly)];
        assert!(!reconcile_attributes(&mut current, &wanted));
        assert_eq!(current[0].name, "A");
    }

    #[test]
    fn test_reconcile_duplicate_names_last_wins() {
        let mut current = Vec::new();
        let wanted = vec![attr("A", ReadOnly), attr("A", ReadWrite)];
        reconcile_attributes(&mut current, &wanted);
        assert_eq!(current, vec![attr("A", ReadWrite)]);
    }

    #[test]
    fn test_fresh_details_default_to_hide() {
        let outcome =
            merge_details(None, &ConstraintsUpdate::new().default_style("roads")).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.details.catalog_mode, Some(CatalogMode::Hide));
        assert_eq!(outcome.details.default_style.as_deref(), Some("roads"));

        let outcome = merge_details(
            None,
            &ConstraintsUpdate::new().catalog_mode(CatalogMode::Challenge),
        )
        .unwrap();
        assert_eq!(outcome.details.catalog_mode, Some(CatalogMode::Challenge));
    }

    #[test]
    fn test_empty_update_on_fresh_details_reports_no_change() {
        let outcome = merge_details(None, &ConstraintsUpdate::new()).unwrap();
        assert!(!outcome.changed);
    }

    #[test]
    fn test_unset_fields_are_left_alone() {
        let existing = LayerDetails {
            cql_filter_read: Some("A = 1".to_string()),
            cql_filter_write: Some("B = 2".to_string()),
            allowed_styles: ["s1".to_string()].into(),
            catalog_mode: Some(CatalogMode::Mixed),
            ..Default::default()
        };

        let outcome = merge_details(
            Some(&existing),
            &ConstraintsUpdate::new().cql_filter_write("B = 3"),
        )
        .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.details.cql_filter_read.as_deref(), Some("A = 1"));
        assert_eq!(outcome.details.cql_filter_write.as_deref(), Some("B = 3"));
        assert_eq!(outcome.details.allowed_styles.len(), 1);
        assert_eq!(outcome.details.catalog_mode, Some(CatalogMode::Mixed));
    }

    #[test]
    fn test_clear_fields() {
        let existing = merge_details(
            None,
            &ConstraintsUpdate::new()
                .allowed_styles(["s1", "s2"])
                .cql_filter_read("A = 1")
                .restricted_area(SQUARE),
        )
        .unwrap()
        .details;
        assert!(existing.area.is_some());

        let update = ConstraintsUpdate {
            allowed_styles: Patch::Clear,
            cql_filter_read: Patch::Clear,
            restricted_area: Patch::Clear,
            ..Default::default()
        };
        let outcome = merge_details(Some(&existing), &update).unwrap();

        assert!(outcome.changed);
        assert!(outcome.details.allowed_styles.is_empty());
        assert!(outcome.details.cql_filter_read.is_none());
        assert!(outcome.details.area.is_none());

        // Clearing what is already clear is a no-op.
        let again = merge_details(Some(&outcome.details), &update).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn test_invalid_area_fails() {
        let err = merge_details(None, &ConstraintsUpdate::new().restricted_area("POLYGON((")).unwrap_err();
        assert!(matches!(err, GeometryError::Parse(_)));
    }

    #[test]
    fn test_input_maps_empty_to_clear() {
        let input: ConstraintsInput = toml::from_str(
            r#"
allowed_styles = []
cql_filter_read = ""
default_style = "roads"
type = "vector"
"#,
        )
        .unwrap();

        let update = input.into_update();
        assert_eq!(update.allowed_styles, Patch::Clear);
        assert_eq!(update.cql_filter_read, Patch::Clear);
        assert_eq!(update.cql_filter_write, Patch::Unset);
        assert_eq!(update.default_style, Patch::Set("roads".to_string()));
        assert_eq!(update.layer_type, Some(LayerType::Vector));
        assert!(update.attributes.is_none());
    }
}
