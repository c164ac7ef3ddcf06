use nodepool_groups::ResourceGroup;
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct GroupView {
    name: String,
    capacity: i32,
    nodes: Vec<i64>,
    lack_of_nodes: i32,
}

impl GroupView {
    fn new(name: &str, group: &ResourceGroup) -> Self {
        Self {
            name: name.to_string(),
            capacity: group.capacity(),
            nodes: group.nodes(),
            lack_of_nodes: group.lack_of_nodes(),
        }
    }
}

pub fn add(ctx: &Context, name: &str) -> anyhow::Result<()> {
    ctx.manager.add_resource_group(name)?;
    println!("✓ Added resource group {name}");
    Ok(())
}

pub fn remove(ctx: &Context, name: &str) -> anyhow::Result<()> {
    ctx.manager.remove_resource_group(name)?;
    println!("✓ Removed resource group {name}");
    Ok(())
}

/// Nodes placed by liveness sit in the default group until claimed.
pub fn assign(ctx: &Context, name: &str, node: i64) -> anyhow::Result<()> {
    ctx.manager.claim_node(name, node)?;
    println!("✓ Assigned node {node} to {name}");
    Ok(())
}

pub fn unassign(ctx: &Context, name: &str, node: i64) -> anyhow::Result<()> {
    ctx.manager.unassign_node(name, node)?;
    println!("✓ Unassigned node {node} from {name}");
    Ok(())
}

pub fn transfer(ctx: &Context, from: &str, to: &str) -> anyhow::Result<()> {
    let node = ctx.manager.transfer_node(from, to)?;
    println!("✓ Transferred node {node} from {from} to {to}");
    Ok(())
}

pub fn recover(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let outcome = ctx.manager.auto_recover_resource_group(name)?;
    println!(
        "✓ Resource group {name} needed {} node(s), recovered {:?}",
        outcome.needed, outcome.recovered
    );
    Ok(())
}

pub fn list(ctx: &Context) -> anyhow::Result<()> {
    let mut views = Vec::new();
    for name in ctx.manager.list_resource_groups() {
        let group = ctx.manager.get_resource_group(&name)?;
        views.push(GroupView::new(&name, &group));
    }

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    for v in &views {
        println!(
            "{:<32} capacity={:<8} lack={:<8} nodes={:?}",
            v.name, v.capacity, v.lack_of_nodes, v.nodes
        );
    }
    Ok(())
}

pub fn show(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let group = ctx.manager.get_resource_group(name)?;
    let view = GroupView::new(name, &group);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Resource group: {}", view.name);
        println!("  Capacity: {}", view.capacity);
        println!("  Lack:     {}", view.lack_of_nodes);
        println!("  Nodes:    {:?}", view.nodes);
    }
    Ok(())
}

pub fn lack(ctx: &Context, name: &str) -> anyhow::Result<()> {
    println!("{}", ctx.manager.check_lack_of_node(name));
    Ok(())
}

pub fn find(ctx: &Context, node: i64) -> anyhow::Result<()> {
    let rg = ctx.manager.find_resource_group_by_node(node)?;
    println!("{rg}");
    Ok(())
}
