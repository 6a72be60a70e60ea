//! Example walking through rule administration on a seeded store.
//!
//! The store is seeded from an embedded TOML configuration, then edited with
//! the same operations an admin API would expose: insert, update, shift,
//! swap, set-limits and filtered search.
//!
//! Run with: `cargo run --example rule_admin`
//!
//! Set `RUST_LOG=georule_admin=debug` to see every ordering step.

use georule_admin::filter::FilterParams;
use georule_admin::prelude::*;
use georule_admin::RuleView;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// ============================================================================
// Compile-time embedded configuration
// ============================================================================

const EMBEDDED_CONFIG: &str = r#"
[settings]
max_page_size = 100

[[instances]]
name = "gs-main"

[[instances]]
name = "gs-backup"

[[rules]]
priority = 10
grant = "allow"
role = "ROLE_ADMIN"

[[rules]]
priority = 20
grant = "allow"
role = "ROLE_EDITOR"
instance = "gs-main"
workspace = "topp"
layer = "states"
ip = "10.0.0.0/8"
constraints = { allowed_styles = ["population", "polygon"], cql_filter_read = "PERSONS > 1000", catalog_mode = "mixed" }

[[rules]]
priority = 30
grant = "limit"
role = "ROLE_GUEST"
limits = { catalog_mode = "hide", allowed_area = "POLYGON((-125 25, -65 25, -65 50, -125 50, -125 25))" }

[[rules]]
grant = "deny"
"#;

// Alternative: load from a file at runtime
// let admin = RuleAdmin::from_toml_file("config/rules.toml")?;

fn print_rules(admin: &RuleAdmin, title: &str) -> Result<(), AdminError> {
    tracing::info!("--- {} ---", title);
    for rule in admin.search(&RuleFilter::any(), Some(Page::new(0, admin.max_page_size())))? {
        tracing::info!(
            "  #{:<3} prio {:<3} {:?} role={:?} ws={:?} layer={:?}",
            rule.id,
            rule.priority,
            rule.grant,
            rule.rolename,
            rule.workspace,
            rule.layer
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "georule_admin=info,rule_admin=info".into()),
        )
        .init();

    let admin = RuleAdmin::from_toml(EMBEDDED_CONFIG)?;
    tracing::info!(
        "Loaded {} rules and {} instances",
        admin.count_all(),
        admin.instances().len()
    );
    print_rules(&admin, "seeded")?;

    // Put a WFS rule right above the editor rule.
    let wfs = admin.insert(
        RuleDraft::new(GrantType::Allow)
            .rolename("ROLE_EDITOR")
            .service("WFS")
            .workspace("topp")
            .layer("roads"),
        Some(InsertPosition::Fixed(20)),
        Some(ConstraintsUpdate::new().attributes(vec![
            LayerAttribute::new("name", AttributeAccess::ReadOnly),
            LayerAttribute::new("geom", AttributeAccess::ReadWrite).datatype("LineString"),
        ])),
    )?;
    print_rules(&admin, "after insert at 20")?;

    // Narrow the attributes: drop "geom", add "lanes".
    admin.update(
        wfs,
        RulePatch::new().request("GetFeature"),
        Some(ConstraintsUpdate::new().attributes(vec![
            LayerAttribute::new("name", AttributeAccess::ReadOnly),
            LayerAttribute::new("lanes", AttributeAccess::ReadOnly),
        ])),
    )?;
    tracing::info!("Updated view: {}", serde_json::to_string_pretty(&admin.view(wfs)?)?);

    // Make room and move the WFS rule to the top.
    let moved = admin.shift(10, 5)?;
    tracing::info!("Shifted {} rules", moved);
    let top = admin.search(&RuleFilter::any(), Some(Page::new(0, 1)))?;
    if let Some(first) = top.first() {
        admin.swap(first.id, wfs)?;
    }
    print_rules(&admin, "after shift and swap")?;

    // Tighten the guest limits; the allowed area is kept.
    let guest = FilterParams {
        role: Some("ROLE_GUEST".into()),
        role_default: Some(false),
        ..FilterParams::default()
    }
    .resolve()?;
    for rule in admin.search(&guest, None)? {
        admin.set_limits(
            rule.id,
            LimitsUpdate {
                catalog_mode: Some(CatalogMode::Challenge),
                allowed_area: None,
            },
        )?;
        let view: RuleView = admin.view(rule.id)?;
        tracing::info!("Guest limits: {}", serde_json::to_string(&view)?);
    }

    // Everything that applies to the topp workspace, including catch-alls.
    let topp = RuleFilter::any().workspace(DimensionFilter::or_default("topp"));
    tracing::info!(
        "{} of {} rules apply to workspace topp",
        admin.count(&topp),
        admin.count_all()
    );

    Ok(())
}
