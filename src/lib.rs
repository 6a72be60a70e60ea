//! # georule-admin
//!
//! Administration engine for priority-ordered access rules guarding a
//! geospatial data service.
//!
//! Every rule is keyed by seven optional dimensions:
//! - **User** and **Role**: who is asking
//! - **Instance**: which registered data server
//! - **Service** and **Request**: OGC service and operation (`WMS`/`GetMap`, ...)
//! - **Workspace** and **Layer**: which data
//!
//! plus an optional source address range and bounding box. Rules carry an
//! `ALLOW`, `DENY` or `LIMIT` grant. Each rule holds a unique priority; lower
//! priorities are evaluated first.
//!
//! ## Features
//!
//! - **Symbolic insertion** - at a fixed priority, or relative to the first or last rule
//! - **Shift and swap** - reorder rules without ever holding a duplicate priority
//! - **Transactions** - every operation is all-or-nothing against a shared store
//! - **Layer constraints** - styles, attribute access, CQL filters and a restricted area
//! - **Partial updates** - explicit unset / clear / set per field, attribute reconciliation by name
//! - **Administrative filters** - per dimension: any, default only, or a value (optionally with defaults)
//! - **TOML seeding** - declare instances and rules in a configuration file
//!
//! ## Quick Start
//!
//! ```
//! use georule_admin::prelude::*;
//!
//! let admin = RuleAdmin::new();
//! admin.register_instance("gs-main").unwrap();
//!
//! // Deny everything by default
//! let deny = admin
//!     .insert(RuleDraft::new(GrantType::Deny), Some(InsertPosition::FromEnd(0)), None)
//!     .unwrap();
//!
//! // Let editors read the states layer, above the catch-all
//! let allow = admin
//!     .insert(
//!         RuleDraft::new(GrantType::Allow)
//!             .rolename("ROLE_EDITOR")
//!             .instance(IdName::Name("gs-main".into()))
//!             .workspace("topp")
//!             .layer("states"),
//!         Some(InsertPosition::FromStart(0)),
//!         Some(
//!             ConstraintsUpdate::new()
//!                 .allowed_styles(["population"])
//!                 .restricted_area("POLYGON((-125 25, -65 25, -65 50, -125 50, -125 25))"),
//!         ),
//!     )
//!     .unwrap();
//!
//! assert!(admin.get(allow).unwrap().priority < admin.get(deny).unwrap().priority);
//!
//! // Which rules apply to the states layer, or to any layer?
//! let filter = RuleFilter::any().layer(DimensionFilter::or_default("states"));
//! assert_eq!(admin.count(&filter), 2);
//! ```
//!
//! ## Insert Positions
//!
//! - `InsertPosition::Fixed(p)`: every rule at `p` or above moves up by one, the new rule takes `p`
//! - `InsertPosition::FromStart(k)`: `k` priorities after the current minimum
//! - `InsertPosition::FromEnd(k)`: `k` slots up from the bottom; `FromEnd(0)` appends
//!
//! On an empty store both relative positions resolve to `k`.
//!
//! ## Filters
//!
//! Query parameters map onto filters through [`filter::FilterParams`]:
//!
//! ```
//! use georule_admin::filter::{DimensionFilter, FilterParams};
//!
//! let params = FilterParams {
//!     workspace: Some("topp".into()),
//!     workspace_default: Some(false),
//!     layer_default: Some(true),
//!     ..FilterParams::default()
//! };
//! let filter = params.resolve().unwrap();
//!
//! assert_eq!(filter.workspace, DimensionFilter::exact("topp"));
//! assert_eq!(filter.layer, DimensionFilter::Default);
//! assert_eq!(filter.user, DimensionFilter::Any);
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and installs no subscriber: `debug` for
//! ordering steps and attribute reconciliation, `info` for committed changes,
//! `warn` for rejected requests.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod merge;
pub mod rule;
pub mod store;
pub mod table;
pub mod view;

// Re-export main types
pub use admin::{LimitsUpdate, RuleAdmin, RuleAdminBuilder, RuleDraft, RulePatch};
pub use config::{AdminConfig, ConfigError, ConfigSettings, RuleConfig};
pub use error::AdminError;
pub use filter::{DimensionFilter, FilterParams, Page, RuleFilter};
pub use geometry::GeometryError;
pub use merge::{ConstraintsInput, ConstraintsUpdate, Patch};
pub use rule::{
    AttributeAccess, CatalogMode, GrantType, IdName, Instance, InstanceId, LayerAttribute,
    LayerDetails, LayerType, Rule, RuleId, RuleLimits,
};
pub use store::RuleStore;
pub use table::{InsertPosition, RuleTable};
pub use view::{ConstraintsView, RuleView};

/// Prelude module for convenient imports.
///
/// ```
/// use georule_admin::prelude::*;
/// ```
pub mod prelude {
    pub use crate::admin::{LimitsUpdate, RuleAdmin, RuleDraft, RulePatch};
    pub use crate::config::ConfigError;
    pub use crate::error::AdminError;
    pub use crate::filter::{DimensionFilter, Page, RuleFilter};
    pub use crate::merge::{ConstraintsInput, ConstraintsUpdate, Patch};
    pub use crate::rule::{AttributeAccess, CatalogMode, GrantType, IdName, LayerAttribute, Rule};
    pub use crate::table::InsertPosition;
}
