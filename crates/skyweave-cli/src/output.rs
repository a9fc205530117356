//! Formatted output helpers for CLI commands.

use std::fmt::Write;

use skyweave_compose::plan::DeploymentPlan;

/// Renders the plan as an indented summary, one block per stack.
#[must_use]
pub fn render_plan(plan: &DeploymentPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deployment Plan");
    let _ = writeln!(out, "{}", "\u{2550}".repeat(35));

    for stack in &plan.stacks {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  Stack {}{}",
            stack.name,
            format_dependencies(&stack.depends_on)
        );
        for resource in plan.resources_in(&stack.name) {
            let _ = writeln!(
                out,
                "    + [{}] {} ({}){}",
                resource.level,
                resource.address,
                resource.kind,
                format_dependencies(&resource.depends_on)
            );
        }
        for (name, export) in &stack.exports {
            let _ = writeln!(out, "    > {name} as {}", export.export_name);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {} resource(s) in {} stack(s) will be synthesized.",
        plan.resources.len(),
        plan.stacks.len()
    );
    let _ = writeln!(out, "  digest: {}", plan.digest);
    out
}

/// Formats a dependency list as ` <- a, b`, or nothing when empty.
#[must_use]
pub fn format_dependencies(dependencies: &[String]) -> String {
    if dependencies.is_empty() {
        String::new()
    } else {
        format!(" <- {}", dependencies.join(", "))
    }
}
