//! The priority-ordered rule table.
//!
//! [`RuleTable`] keeps rules by id plus a priority index. The index refuses to
//! hold two rules at the same priority at any point, so every reordering
//! operation moves rules in an order that never collides:
//!
//! - **insert**: resolve the position, shift the tail up by one, place the rule
//! - **shift**: move the affected rules starting from the highest priority
//! - **swap**: park one rule on a scratch slot above the current maximum
//!
//! The table itself is not synchronized; see [`crate::store::RuleStore`] for
//! the shared, transactional wrapper.

use std::collections::{BTreeMap, HashMap};

use crate::error::{AdminError, Result};
use crate::filter::{Page, RuleFilter};
use crate::rule::{GrantType, IdName, Instance, InstanceId, LayerDetails, Rule, RuleId, RuleLimits};

/// Where to place a new rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Exactly this priority.
    Fixed(u64),
    /// This many priorities after the current minimum.
    FromStart(u64),
    /// This many slots up from the bottom: `FromEnd(0)` appends after the
    /// current maximum, `FromEnd(1)` lands just before the last rule.
    FromEnd(u64),
}

/// Ordered rule table with unique priorities.
///
/// # Example
/// ```
/// use georule_admin::table::{InsertPosition, RuleTable};
/// use georule_admin::{GrantType, Rule};
///
/// let mut table = RuleTable::new();
/// let r1 = table.insert(Rule::new(GrantType::Allow), InsertPosition::Fixed(0)).unwrap();
/// let r2 = table.insert(Rule::new(GrantType::Deny), InsertPosition::Fixed(0)).unwrap();
///
/// assert_eq!(table.get(r1).unwrap().priority, 1);
/// assert_eq!(table.get(r2).unwrap().priority, 0);
/// ```
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<RuleId, Rule>,
    by_priority: BTreeMap<u64, RuleId>,
    instances: BTreeMap<InstanceId, Instance>,
    next_rule_id: RuleId,
    next_instance_id: InstanceId,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            rules: HashMap::new(),
            by_priority: BTreeMap::new(),
            instances: BTreeMap::new(),
            next_rule_id: 1,
            next_instance_id: 1,
        }
    }
}

impl RuleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Lowest priority in use.
    pub fn min_priority(&self) -> Option<u64> {
        self.by_priority.keys().next().copied()
    }

    /// Highest priority in use.
    pub fn max_priority(&self) -> Option<u64> {
        self.by_priority.keys().next_back().copied()
    }

    /// Iterate rules in ascending priority.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.by_priority.values().filter_map(|id| self.rules.get(id))
    }

    /// Get a rule by id.
    pub fn get(&self, id: RuleId) -> Result<&Rule> {
        self.rules.get(&id).ok_or_else(|| AdminError::rule_not_found(id))
    }

    fn get_mut(&mut self, id: RuleId) -> Result<&mut Rule> {
        self.rules
            .get_mut(&id)
            .ok_or_else(|| AdminError::rule_not_found(id))
    }

    /// Resolve a symbolic position to an absolute priority.
    pub fn resolve_position(&self, position: InsertPosition) -> u64 {
        match (position, self.min_priority(), self.max_priority()) {
            (InsertPosition::Fixed(priority), _, _) => priority,
            (InsertPosition::FromStart(offset), Some(min), _) => min.saturating_add(offset),
            (InsertPosition::FromEnd(offset), _, Some(max)) => {
                max.saturating_add(1).saturating_sub(offset)
            }
            (InsertPosition::FromStart(offset), None, _)
            | (InsertPosition::FromEnd(offset), _, None) => offset,
        }
    }

    /// Insert a rule at a position and return its new id.
    ///
    /// Every rule at or above the resolved priority moves up by one first.
    /// The rule's `id` and `priority` are assigned here; attachments
    /// (details, limits) on the incoming rule are dropped.
    pub fn insert(&mut self, mut rule: Rule, position: InsertPosition) -> Result<RuleId> {
        let priority = self.resolve_position(position);

        if self.by_priority.range(priority..).next().is_some() {
            self.shift(priority, 1)?;
        }

        let id = self.next_rule_id;
        self.next_rule_id += 1;

        rule.id = id;
        rule.priority = priority;
        rule.details = None;
        rule.limits = None;

        tracing::debug!(rule_id = id, priority, ?position, "Placing rule");
        self.by_priority.insert(priority, id);
        self.rules.insert(id, rule);
        Ok(id)
    }

    /// Add `amount` to the priority of every rule at or above `threshold`.
    ///
    /// Returns the number of rules moved. Only positive amounts are accepted.
    pub fn shift(&mut self, threshold: u64, amount: i64) -> Result<usize> {
        if amount <= 0 {
            return Err(AdminError::validation(format!(
                "Shift amount must be positive, got {}",
                amount
            )));
        }
        let amount = amount as u64;

        let targets: Vec<(u64, RuleId)> = self
            .by_priority
            .range(threshold..)
            .rev()
            .map(|(priority, id)| (*priority, *id))
            .collect();

        // Highest first: each target slot is either free or already vacated.
        for &(priority, id) in &targets {
            let to = priority.checked_add(amount).ok_or_else(|| {
                AdminError::conflict(format!(
                    "Shifting rule {} from priority {} overflows",
                    id, priority
                ))
            })?;
            self.move_rule(id, priority, to)?;
        }

        tracing::debug!(threshold, amount, moved = targets.len(), "Shifted rules");
        Ok(targets.len())
    }

    /// Exchange the priorities of two rules.
    pub fn swap(&mut self, a: RuleId, b: RuleId) -> Result<()> {
        if a == b {
            return Err(AdminError::validation(format!(
                "Cannot swap rule {} with itself",
                a
            )));
        }
        let pa = self.get(a)?.priority;
        let pb = self.get(b)?.priority;

        let scratch = self
            .max_priority()
            .and_then(|max| max.checked_add(1))
            .ok_or_else(|| AdminError::conflict("No free priority to swap through"))?;

        self.move_rule(a, pa, scratch)?;
        self.move_rule(b, pb, pa)?;
        self.move_rule(a, scratch, pb)?;

        tracing::debug!(a, b, a_priority = pb, b_priority = pa, "Swapped rules");
        Ok(())
    }

    fn move_rule(&mut self, id: RuleId, from: u64, to: u64) -> Result<()> {
        if let Some(other) = self.by_priority.get(&to) {
            return Err(AdminError::conflict(format!(
                "Priority {} already held by rule {}",
                to, other
            )));
        }
        self.by_priority.remove(&from);
        self.by_priority.insert(to, id);
        self.get_mut(id)?.priority = to;
        Ok(())
    }

    /// Replace every mutable field of a stored rule.
    ///
    /// Id and priority of the stored rule are kept, and so are its details
    /// and limits as long as the new grant and layer still allow them. An
    /// attachment the rule can no longer carry is dropped.
    pub fn update(&mut self, rule: Rule) -> Result<()> {
        let id = rule.id;
        let stored = self.get_mut(id)?;
        stored.grant = rule.grant;
        stored.username = rule.username;
        stored.rolename = rule.rolename;
        stored.instance = rule.instance;
        stored.service = rule.service;
        stored.request = rule.request;
        stored.workspace = rule.workspace;
        stored.layer = rule.layer;
        stored.address_range = rule.address_range;
        stored.bbox = rule.bbox;

        if stored.details.is_some() && !stored.accepts_details() {
            tracing::info!(rule_id = id, grant = ?stored.grant, "Dropping layer details");
            stored.details = None;
        }
        if stored.limits.is_some() && !stored.accepts_limits() {
            tracing::info!(rule_id = id, grant = ?stored.grant, "Dropping limits");
            stored.limits = None;
        }
        Ok(())
    }

    /// Remove a rule with its attachments. Priorities are not compacted.
    pub fn delete(&mut self, id: RuleId) -> bool {
        match self.rules.remove(&id) {
            Some(rule) => {
                self.by_priority.remove(&rule.priority);
                true
            }
            None => false,
        }
    }

    /// Attach, replace or drop (`None`) a rule's layer details.
    ///
    /// Details only make sense on `ALLOW` rules bound to a layer.
    pub fn set_details(&mut self, id: RuleId, details: Option<LayerDetails>) -> Result<()> {
        let rule = self.get_mut(id)?;
        if details.is_some() && !rule.accepts_details() {
            return Err(if rule.grant != GrantType::Allow {
                AdminError::validation(format!("Rule {} is not of ALLOW type", id))
            } else {
                AdminError::validation(format!("Rule {} does not refer to a fixed layer", id))
            });
        }
        rule.details = details;
        Ok(())
    }

    /// Attach, replace or drop (`None`) a rule's limits. `LIMIT` rules only.
    pub fn set_limits(&mut self, id: RuleId, limits: Option<RuleLimits>) -> Result<()> {
        let rule = self.get_mut(id)?;
        if limits.is_some() && !rule.accepts_limits() {
            return Err(AdminError::validation(format!(
                "Rule {} is not of LIMIT type",
                id
            )));
        }
        rule.limits = limits;
        Ok(())
    }

    /// Rules matching a filter, in ascending priority, optionally paged.
    pub fn search(&self, filter: &RuleFilter, page: Option<Page>) -> Vec<Rule> {
        let matching = self.iter().filter(|rule| filter.matches(rule));
        match page {
            Some(page) => matching
                .skip(page.offset())
                .take(page.size)
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        }
    }

    /// Number of rules matching a filter.
    pub fn count(&self, filter: &RuleFilter) -> u64 {
        self.rules.values().filter(|rule| filter.matches(rule)).count() as u64
    }

    /// Register a network instance under a unique name.
    pub fn register_instance(&mut self, name: &str) -> Result<InstanceId> {
        if name.trim().is_empty() {
            return Err(AdminError::validation("Instance name is empty"));
        }
        if self.instances.values().any(|i| i.name == name) {
            return Err(AdminError::conflict(format!(
                "Instance '{}' already registered",
                name
            )));
        }
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        self.instances.insert(
            id,
            Instance {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    /// Look up an instance by id or name.
    pub fn resolve_instance(&self, reference: &IdName) -> Result<Instance> {
        self.instances
            .values()
            .find(|instance| reference.designates(instance))
            .cloned()
            .ok_or_else(|| AdminError::not_found(format!("instance {:?}", reference)))
    }

    /// Registered instances, by id.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> + '_ {
        self.instances.values()
    }
}
