//! Plan display

use colored::Colorize;
use reconcile::ResourceKind;
use std::collections::BTreeMap;

use super::planner::{Action, Plan};
use crate::ui;

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::FirewallRule => "Firewall rules",
        ResourceKind::IpSet => "IP sets",
        ResourceKind::SecurityPolicyRule => "Security policy rules",
        ResourceKind::Service => "Services",
        ResourceKind::EdgeFirewallRule => "Edge firewall rules",
    }
}

/// One line per action, with the changed fields under updates.
pub fn describe(action: &Action) -> Vec<String> {
    match action {
        Action::Create { address, .. } => vec![format!("+ {address}")],
        Action::Delete { address, handle, .. } => vec![format!("- {address} ({handle})")],
        Action::Update {
            address, changes, ..
        } => {
            let mut lines = vec![format!("~ {address}")];
            lines.extend(changes.iter().map(|c| {
                format!(
                    "    {}: {} → {}",
                    c.field,
                    ui::truncate(&c.from, 40),
                    ui::truncate(&c.to, 40)
                )
            }));
            lines
        }
    }
}

/// Display a plan in a user-friendly format
pub fn display_plan(plan: &Plan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    let mut by_kind: BTreeMap<ResourceKind, Vec<&Action>> = BTreeMap::new();
    for action in &plan.actions {
        by_kind.entry(action.kind()).or_default().push(action);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Plan".bold()
    );
    println!("│");

    for (kind, actions) in &by_kind {
        println!("│ {}", kind_title(*kind).bold());
        for action in actions {
            for (i, line) in describe(action).into_iter().enumerate() {
                let line = match (i, action) {
                    (0, Action::Create { .. }) => line.green(),
                    (0, Action::Delete { .. }) => line.red(),
                    (0, Action::Update { .. }) => line.yellow(),
                    _ => line.dimmed(),
                };
                println!("│   {line}");
            }
        }
        println!("│");
    }

    let created = plan.count(|a| matches!(a, Action::Create { .. }));
    let updated = plan.count(|a| matches!(a, Action::Update { .. }));
    let deleted = plan.count(|a| matches!(a, Action::Delete { .. }));

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to delete, {} unchanged",
        created.to_string().green(),
        updated.to_string().yellow(),
        deleted.to_string().red(),
        plan.unchanged
    );
    println!("└─────────────────────────────────────────────────────┘");
}
