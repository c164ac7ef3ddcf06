use nodepool_cluster::MemberStatus;
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct NodeView {
    id: i64,
    address: String,
    status: &'static str,
    last_heartbeat: u64,
    resource_group: Option<String>,
}

pub fn join(ctx: &Context, id: i64, address: &str) -> anyhow::Result<()> {
    ctx.membership.join(id, address)?;
    let rg = ctx.manager.handle_node_up(id)?;
    println!("✓ Node {id} joined ({address}), resource group {rg}");
    Ok(())
}

pub fn heartbeat(ctx: &Context, id: i64) -> anyhow::Result<()> {
    if !ctx.membership.heartbeat(id)? {
        anyhow::bail!("node {id} is not registered");
    }
    println!("✓ Heartbeat recorded for node {id}");
    Ok(())
}

pub fn drain(ctx: &Context, id: i64) -> anyhow::Result<()> {
    if !ctx.membership.drain(id)? {
        anyhow::bail!("node {id} is not registered");
    }
    println!("✓ Node {id} is draining");
    Ok(())
}

pub fn leave(ctx: &Context, id: i64) -> anyhow::Result<()> {
    // The group is read while the registry still knows the node.
    let rg = ctx.manager.find_resource_group_by_node(id).ok();
    if !ctx.membership.leave(id)? {
        anyhow::bail!("node {id} is not registered");
    }
    match rg {
        Some(rg) => println!("✓ Node {id} left the cluster (was in {rg})"),
        None => println!("✓ Node {id} left the cluster"),
    }
    Ok(())
}

pub fn up(ctx: &Context, id: i64) -> anyhow::Result<()> {
    let rg = ctx.manager.handle_node_up(id)?;
    println!("✓ Node {id} is in resource group {rg}");
    Ok(())
}

pub fn down(ctx: &Context, id: i64) -> anyhow::Result<()> {
    let rg = ctx.manager.handle_node_down(id)?;
    println!("✓ Node {id} removed from resource group {rg}");
    Ok(())
}

pub fn list(ctx: &Context) -> anyhow::Result<()> {
    let views: Vec<NodeView> = ctx
        .membership
        .list_members()?
        .into_iter()
        .map(|m| NodeView {
            id: m.node_id,
            resource_group: ctx.manager.find_resource_group_by_node(m.node_id).ok(),
            address: m.address,
            status: status_str(m.status),
            last_heartbeat: m.last_heartbeat,
        })
        .collect();

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    for v in &views {
        println!(
            "{:>6}  {:<22} {:<9} {}",
            v.id,
            v.address,
            v.status,
            v.resource_group.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

pub fn reap(ctx: &Context) -> anyhow::Result<()> {
    let reaped = ctx.membership.reap_dead_nodes()?;
    if reaped.is_empty() {
        println!("No dead nodes");
    } else {
        println!("✓ Reaped {} dead node(s): {reaped:?}", reaped.len());
    }
    Ok(())
}

fn status_str(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Ready => "ready",
        MemberStatus::Stopping => "stopping",
        MemberStatus::Dead => "dead",
    }
}
