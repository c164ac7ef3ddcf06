use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use nodepool_cluster::{MemberStatus, MembershipManager};
use nodepool_groups::ResourceManager;
use nodepool_state::StateStore;
use tracing::{info, warn};

use crate::config::NodepoolConfig;

pub mod group;
pub mod node;

/// Everything a command needs, rebuilt from the store on every run.
pub struct Context {
    pub membership: Arc<MembershipManager>,
    pub manager: ResourceManager,
    pub json: bool,
}

impl Context {
    pub fn open(config: &NodepoolConfig, json: bool) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating {}", config.data_dir.display()))?;
        let db_path = config.db_path();
        let state = StateStore::open(&db_path)
            .with_context(|| format!("opening state store {}", db_path.display()))?;
        info!(path = ?db_path, "state store opened");

        let membership = Arc::new(
            MembershipManager::new(state.clone())
                .with_dead_timeout(Duration::from_secs(config.membership.dead_timeout_secs)),
        );
        let manager = ResourceManager::new(Arc::new(state), membership.clone());
        manager.recover()?;

        let ctx = Self {
            membership,
            manager,
            json,
        };
        ctx.sync_liveness()?;
        Ok(ctx)
    }

    /// Report every live node to the resource manager.
    ///
    /// Liveness placement is held in memory only, so each run replays it.
    fn sync_liveness(&self) -> anyhow::Result<()> {
        for member in self.membership.list_members()? {
            if member.status != MemberStatus::Ready {
                continue;
            }
            if let Err(e) = self.manager.handle_node_up(member.node_id) {
                warn!(node_id = member.node_id, error = %e, "failed to place live node");
            }
        }
        Ok(())
    }
}
