//! Subcommand implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use hwcloud_provider::types::{PlanAction, ResourceMode, ResourceState, StateFile};
use hwcloud_provider::{Config, LifecycleService, ProviderSettings, ResourceRegistry, ServiceContext};

use crate::configuration::{Block, Configuration};
use crate::references::{order_blocks, resolve};
use crate::state_store::StateStore;
use crate::{lint, schema_doc};

/// Loaded configuration, state and the service that acts on them.
pub struct Session {
    config: Configuration,
    store: StateStore,
    state: StateFile,
    service: LifecycleService,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    add: usize,
    change: usize,
    replace: usize,
    destroy: usize,
}

impl Summary {
    fn count(&mut self, action: PlanAction) {
        match action {
            PlanAction::Create => self.add += 1,
            PlanAction::Update => self.change += 1,
            PlanAction::Replace => self.replace += 1,
            PlanAction::NoOp => {}
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to replace, {} to destroy.",
            self.add, self.change, self.replace, self.destroy
        )
    }
}

/// Managed state entries with no block in the configuration, newest first.
fn orphans<'a>(config: &Configuration, state: &'a StateFile) -> Vec<&'a ResourceState> {
    state
        .resources
        .iter()
        .rev()
        .filter(|r| r.mode == ResourceMode::Managed && config.find(&r.address()).is_none())
        .collect()
}

fn print_changes(address: &str, plan: &hwcloud_provider::types::Plan) {
    println!("  {address}: {}", plan.action);
    for change in &plan.changes {
        let (old, new) = if change.sensitive {
            ("(sensitive)".to_string(), "(sensitive)".to_string())
        } else {
            (change.old.to_string(), change.new.to_string())
        };
        let marker = if change.force_new { " (forces replacement)" } else { "" };
        println!("      {}: {old} -> {new}{marker}", change.key);
    }
}

impl Session {
    pub async fn open(config_path: &Path, state_path: &Path) -> Result<Self> {
        let config = Configuration::load(config_path).await?;
        let store = StateStore::new(state_path);
        let state = store.load().await?;

        let provider = Config::builder()
            .provider_block(config.provider.clone())
            .env(ProviderSettings::from_env())
            .build()
            .context("invalid provider configuration")?;
        let ctx = ServiceContext::new(Arc::new(provider), Arc::new(ResourceRegistry::with_defaults()));

        Ok(Self {
            config,
            store,
            state,
            service: LifecycleService::new(Arc::new(ctx)),
        })
    }

    fn prior(&self, block: &Block) -> Option<&ResourceState> {
        self.state.find(block.mode, &block.type_name, &block.name)
    }

    async fn record(&mut self, state: ResourceState) -> Result<()> {
        self.state.upsert(state);
        self.store.save(&self.state).await
    }

    async fn forget(&mut self, entry: &ResourceState) -> Result<()> {
        self.state.remove(entry.mode, &entry.type_name, &entry.name);
        self.store.save(&self.state).await
    }

    async fn read_data(&self, block: &Block, scratch: &StateFile) -> Result<Option<ResourceState>> {
        let Ok(body) = resolve(&block.body, scratch) else {
            return Ok(None);
        };
        let state = self
            .service
            .read_data_source(&block.type_name, &block.name, &body)
            .await
            .with_context(|| format!("failed to read {}", block.address()))?;
        Ok(Some(state))
    }

    /// Print what `apply` would do. Data sources are read so that values depending on
    /// them can be planned; nothing is persisted.
    pub async fn plan(&self) -> Result<()> {
        let mut scratch = self.state.clone();
        let mut summary = Summary::default();

        for block in order_blocks(&self.config.blocks)? {
            let address = block.address();
            if block.mode == ResourceMode::Data {
                match self.read_data(block, &scratch).await? {
                    Some(state) => scratch.upsert(state),
                    None => println!("  {address}: read (during apply)"),
                }
                continue;
            }

            let prior = self.prior(block);
            match resolve(&block.body, &scratch) {
                Ok(body) => {
                    let plan = self
                        .service
                        .plan(&block.type_name, &body, prior)
                        .with_context(|| format!("failed to plan {address}"))?;
                    summary.count(plan.action);
                    if plan.action != PlanAction::NoOp {
                        print_changes(&address, &plan);
                    }
                }
                Err(unknown) => {
                    let action = if prior.is_some() { PlanAction::Update } else { PlanAction::Create };
                    summary.count(action);
                    println!("  {address}: {action} (known after apply: {})", unknown.join(", "));
                }
            }
        }

        for orphan in orphans(&self.config, &self.state) {
            summary.destroy += 1;
            println!("  {}: destroy", orphan.address());
        }
        println!("Plan: {summary}");
        Ok(())
    }

    /// Bring remote objects in line with the configuration, saving state after every step.
    pub async fn apply(&mut self) -> Result<()> {
        let blocks: Vec<Block> = order_blocks(&self.config.blocks)?.into_iter().cloned().collect();
        let mut summary = Summary::default();

        for block in &blocks {
            let address = block.address();
            let body = resolve(&block.body, &self.state)
                .map_err(|unknown| anyhow::anyhow!("{address}: unresolved references {}", unknown.join(", ")))?;

            if block.mode == ResourceMode::Data {
                let state = self
                    .service
                    .read_data_source(&block.type_name, &block.name, &body)
                    .await
                    .with_context(|| format!("failed to read {address}"))?;
                self.record(state).await?;
                continue;
            }

            let prior = self.prior(block).cloned();
            let plan = self
                .service
                .plan(&block.type_name, &body, prior.as_ref())
                .with_context(|| format!("failed to plan {address}"))?;
            summary.count(plan.action);
            if plan.action == PlanAction::NoOp {
                continue;
            }

            println!("{address}: {}ing...", plan.action.to_string().trim_end_matches('e'));
            let state = self
                .service
                .apply_plan(&block.type_name, &block.name, &plan, prior.as_ref())
                .await
                .with_context(|| format!("failed to {} {address}", plan.action))?;
            println!("{address}: done [id={}]", state.id);
            self.record(state).await?;
        }

        let orphans: Vec<ResourceState> = orphans(&self.config, &self.state).into_iter().cloned().collect();
        for orphan in orphans {
            summary.destroy += 1;
            self.destroy_one(&orphan).await?;
        }
        println!("Apply complete! {summary}");
        Ok(())
    }

    async fn destroy_one(&mut self, entry: &ResourceState) -> Result<()> {
        let address = entry.address();
        println!("{address}: destroying... [id={}]", entry.id);
        self.service
            .destroy(entry)
            .await
            .with_context(|| format!("failed to destroy {address}"))?;
        self.forget(entry).await
    }

    /// Delete everything in state, dependents before their dependencies.
    pub async fn destroy(&mut self) -> Result<()> {
        let mut ordered: Vec<ResourceState> = order_blocks(&self.config.blocks)?
            .into_iter()
            .rev()
            .filter(|b| b.mode == ResourceMode::Managed)
            .filter_map(|b| self.prior(b).cloned())
            .collect();
        ordered.extend(orphans(&self.config, &self.state).into_iter().cloned());

        let count = ordered.len();
        for entry in &ordered {
            self.destroy_one(entry).await?;
        }

        // Data source results are meaningless without the resources.
        let data: Vec<ResourceState> = self
            .state
            .resources
            .iter()
            .filter(|r| r.mode == ResourceMode::Data)
            .cloned()
            .collect();
        for entry in &data {
            self.forget(entry).await?;
        }
        println!("Destroy complete! {count} destroyed.");
        Ok(())
    }

    /// Re-read every managed resource; vanished ones leave state.
    pub async fn refresh(&mut self) -> Result<()> {
        let entries: Vec<ResourceState> = self
            .state
            .resources
            .iter()
            .filter(|r| r.mode == ResourceMode::Managed)
            .cloned()
            .collect();

        for entry in &entries {
            let address = entry.address();
            let refreshed = self
                .service
                .refresh(entry)
                .await
                .with_context(|| format!("failed to refresh {address}"))?;
            match refreshed {
                Some(state) => {
                    println!("{address}: refreshed [id={}]", state.id);
                    self.record(state).await?;
                }
                None => {
                    println!("{address}: no longer exists, removed from state");
                    self.forget(entry).await?;
                }
            }
        }
        Ok(())
    }

    /// Adopt the remote object `id` as `address` (`type.name`).
    pub async fn import(&mut self, address: &str, id: &str) -> Result<()> {
        let Some((type_name, name)) = address.split_once('.') else {
            bail!("invalid address '{address}', expected <type>.<name>");
        };
        if self.state.find(ResourceMode::Managed, type_name, name).is_some() {
            bail!("{address} is already managed; remove it from state before importing");
        }
        if self.config.find(address).is_none() {
            tracing::warn!("{address} has no block in the configuration; the next apply will destroy it");
        }

        let state = self
            .service
            .import(type_name, name, id)
            .await
            .with_context(|| format!("failed to import {address} from '{id}'"))?;
        println!("{address}: imported [id={}]", state.id);
        self.record(state).await
    }
}

/// `hwcloud schema [type]`
pub fn schema(type_name: Option<&str>) -> Result<()> {
    let registry = ResourceRegistry::with_defaults();
    let doc = match type_name {
        Some(name) => schema_doc::describe_type(&registry, name)?,
        None => schema_doc::catalog(&registry),
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

/// `hwcloud lint <dir>`; returns whether the tree is clean.
pub fn lint(dir: &Path) -> Result<bool> {
    let findings = lint::check_dir(dir)?;
    for finding in &findings {
        println!("{finding}");
    }
    if findings.is_empty() {
        println!("no read handlers without check_deleted");
    } else {
        println!("{} read handler(s) without check_deleted", findings.len());
    }
    Ok(findings.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn entry(type_name: &str, name: &str) -> ResourceState {
        ResourceState {
            mode: ResourceMode::Managed,
            type_name: type_name.into(),
            name: name.into(),
            id: format!("{name}-id"),
            attributes: Map::new(),
        }
    }

    #[test]
    fn orphans_are_state_entries_without_blocks() {
        let config = Configuration::parse(r#"{"resource": {"huaweicloud_vpc": {"main": {"name": "a"}}}}"#).unwrap();
        let mut state = StateFile::default();
        state.upsert(entry("huaweicloud_vpc", "main"));
        state.upsert(entry("huaweicloud_vpc", "old"));
        state.upsert(entry("huaweicloud_vpc_subnet", "old"));

        let found: Vec<String> = orphans(&config, &state).iter().map(|r| r.address()).collect();
        assert_eq!(found, vec!["huaweicloud_vpc_subnet.old", "huaweicloud_vpc.old"]);
    }

    #[test]
    fn summary_counts_actions() {
        let mut summary = Summary::default();
        for action in [PlanAction::Create, PlanAction::Create, PlanAction::NoOp, PlanAction::Replace] {
            summary.count(action);
        }
        summary.destroy = 1;
        assert_eq!(summary.to_string(), "2 to add, 0 to change, 1 to replace, 1 to destroy.");
    }

    #[test]
    fn lint_reports_clean_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.rs"), "fn main() {}\n").unwrap();
        assert!(lint(dir.path()).unwrap());
    }
}
