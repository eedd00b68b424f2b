//! Plan, apply, refresh, destroy and import of single resources

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};
use crate::resource_data::{ResourceData, Timeouts};
use crate::schema::{SchemaMap, diff, merge_computed, prepare_config};
use crate::services::ServiceContext;
use crate::traits::Resource;
use crate::types::{Plan, PlanAction, ResourceMode, ResourceState};

/// Drives resource handlers through their lifecycle.
pub struct LifecycleService {
    ctx: Arc<ServiceContext>,
}

/// Split the `timeouts` block off a raw configuration and apply it to `defaults`.
fn split_timeouts(config: &Map<String, Value>, defaults: Timeouts) -> ProviderResult<(Map<String, Value>, Timeouts)> {
    let mut config = config.clone();
    let mut timeouts = defaults;
    match config.remove("timeouts") {
        None | Some(Value::Null) => {}
        Some(Value::Object(block)) => timeouts.apply_overrides(&block)?,
        Some(other) => {
            return Err(ProviderError::Validation(format!(
                "timeouts: expected a block, got {other}"
            )));
        }
    }
    Ok((config, timeouts))
}

fn prepare(type_name: &str, schema: &SchemaMap, config: &Map<String, Value>) -> ProviderResult<Map<String, Value>> {
    prepare_config(schema, config)
        .map_err(|errors| ProviderError::Validation(format!("{type_name}: {}", errors.join("; "))))
}

fn log_failure(err: &ProviderError) {
    if err.is_expected() {
        log::warn!("{err}");
    } else {
        log::error!("{err}");
    }
}

impl LifecycleService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Validate `config` and decide what `apply` has to do.
    pub fn plan(
        &self,
        type_name: &str,
        config: &Map<String, Value>,
        prior: Option<&ResourceState>,
    ) -> ProviderResult<Plan> {
        let resource = self.ctx.registry.resource(type_name)?;
        let schema = resource.schema();
        let (config, timeouts) = split_timeouts(config, resource.timeouts())?;
        let planned = prepare(type_name, &schema, &config)?;

        let Some(prior) = prior else {
            return Ok(Plan {
                action: PlanAction::Create,
                changes: diff(&schema, &Map::new(), &planned),
                planned,
                timeouts,
            });
        };

        let changes = diff(&schema, &prior.attributes, &planned);
        if changes.is_empty() {
            return Ok(Plan {
                action: PlanAction::NoOp,
                changes,
                planned: merge_computed(&schema, &prior.attributes, &planned),
                timeouts,
            });
        }

        let blocked: Vec<&str> = changes
            .iter()
            .map(|c| c.key.as_str())
            .filter(|k| resource.non_updatable_params().contains(k))
            .collect();
        let force_new_enabled = planned.get("enable_force_new").and_then(Value::as_str) == Some("true");
        let action = if !blocked.is_empty() {
            if !force_new_enabled {
                return Err(ProviderError::Plan(format!(
                    "{}: can't change non-updatable parameters [{}]; set enable_force_new = \"true\" to replace the resource",
                    prior.address(),
                    blocked.join(", ")
                )));
            }
            PlanAction::Replace
        } else if changes.iter().any(|c| c.force_new) {
            PlanAction::Replace
        } else {
            PlanAction::Update
        };
        // A replacement starts from the configuration alone; computed values belong to the old object.
        let planned = match action {
            PlanAction::Replace => planned,
            _ => merge_computed(&schema, &prior.attributes, &planned),
        };

        Ok(Plan {
            action,
            changes,
            planned,
            timeouts,
        })
    }

    /// Plan and carry out the change. Returns the new state.
    pub async fn apply(
        &self,
        type_name: &str,
        name: &str,
        config: &Map<String, Value>,
        prior: Option<&ResourceState>,
    ) -> ProviderResult<ResourceState> {
        let plan = self.plan(type_name, config, prior)?;
        self.apply_plan(type_name, name, &plan, prior)
            .await
            .inspect_err(log_failure)
    }

    /// Carry out an existing plan.
    pub async fn apply_plan(
        &self,
        type_name: &str,
        name: &str,
        plan: &Plan,
        prior: Option<&ResourceState>,
    ) -> ProviderResult<ResourceState> {
        let resource = self.ctx.registry.resource(type_name)?;
        log::info!("{type_name}.{name}: {}", plan.action);

        match (plan.action, prior) {
            (PlanAction::NoOp, Some(prior)) => Ok(prior.clone()),
            (PlanAction::Update, Some(prior)) => {
                let mut d = ResourceData::existing(
                    resource.schema(),
                    prior.id.clone(),
                    prior.attributes.clone(),
                    plan.planned.clone(),
                    plan.timeouts,
                );
                resource.update(&self.ctx.config, &mut d).await?;
                self.read_back(resource.as_ref(), name, &mut d).await
            }
            (PlanAction::Replace, Some(prior)) => {
                self.delete_with(resource.as_ref(), prior, plan.timeouts).await?;
                self.create(resource.as_ref(), name, plan).await
            }
            (PlanAction::Create, _) => self.create(resource.as_ref(), name, plan).await,
            (action, None) => Err(ProviderError::Plan(format!(
                "{type_name}.{name}: {action} needs prior state"
            ))),
        }
    }

    async fn create(&self, resource: &dyn Resource, name: &str, plan: &Plan) -> ProviderResult<ResourceState> {
        let mut d = ResourceData::new(resource.schema(), plan.planned.clone(), plan.timeouts);
        resource.create(&self.ctx.config, &mut d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::Plan(format!(
                "{}.{name}: create finished without setting an ID",
                resource.type_name()
            )));
        }
        self.read_back(resource, name, &mut d).await
    }

    async fn read_back(&self, resource: &dyn Resource, name: &str, d: &mut ResourceData) -> ProviderResult<ResourceState> {
        let id = d.id().to_string();
        resource.read(&self.ctx.config, d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::ResourceNotFound(format!(
                "{}.{name} ({id}) disappeared right after it was written",
                resource.type_name()
            )));
        }
        Ok(ResourceState {
            mode: ResourceMode::Managed,
            type_name: resource.type_name().to_string(),
            name: name.to_string(),
            id: d.id().to_string(),
            attributes: d.state(),
        })
    }

    /// Re-read a resource. `None` means it no longer exists.
    pub async fn refresh(&self, state: &ResourceState) -> ProviderResult<Option<ResourceState>> {
        let resource = self.ctx.registry.resource(&state.type_name)?;
        let mut d = ResourceData::existing(
            resource.schema(),
            state.id.clone(),
            state.attributes.clone(),
            state.attributes.clone(),
            resource.timeouts(),
        );
        resource
            .read(&self.ctx.config, &mut d)
            .await
            .inspect_err(log_failure)?;
        if d.id().is_empty() {
            log::warn!("{} is gone", state.address());
            return Ok(None);
        }
        Ok(Some(ResourceState {
            id: d.id().to_string(),
            attributes: d.state(),
            ..state.clone()
        }))
    }

    /// Delete a resource. A resource that is already gone counts as deleted.
    pub async fn destroy(&self, state: &ResourceState) -> ProviderResult<()> {
        let resource = self.ctx.registry.resource(&state.type_name)?;
        log::info!("{}: destroy", state.address());
        self.delete_with(resource.as_ref(), state, resource.timeouts())
            .await
            .inspect_err(log_failure)
    }

    async fn delete_with(&self, resource: &dyn Resource, state: &ResourceState, timeouts: Timeouts) -> ProviderResult<()> {
        let mut d = ResourceData::existing(
            resource.schema(),
            state.id.clone(),
            state.attributes.clone(),
            state.attributes.clone(),
            timeouts,
        );
        match resource.delete(&self.ctx.config, &mut d).await {
            Err(e) if e.is_not_found() => {
                log::warn!("{} was already deleted", state.address());
                Ok(())
            }
            other => other,
        }
    }

    /// Adopt an existing remote object under `type_name.name`.
    pub async fn import(&self, type_name: &str, name: &str, id: &str) -> ProviderResult<ResourceState> {
        let resource = self.ctx.registry.resource(type_name)?;
        let mut d = ResourceData::from_id(resource.schema(), id, resource.timeouts());
        resource.import(&self.ctx.config, &mut d).await?;
        if d.id().is_empty() {
            return Err(ProviderError::ResourceNotFound(format!("{type_name} {id}")));
        }
        let state = self.read_back(resource.as_ref(), name, &mut d).await;
        match state {
            Err(ProviderError::ResourceNotFound(_)) => {
                Err(ProviderError::ResourceNotFound(format!("{type_name} {id}")))
            }
            other => other,
        }
    }

    /// Run a data source query.
    pub async fn read_data_source(
        &self,
        type_name: &str,
        name: &str,
        config: &Map<String, Value>,
    ) -> ProviderResult<ResourceState> {
        let data_source = self.ctx.registry.data_source(type_name)?;
        let schema = data_source.schema();
        let planned = prepare(type_name, &schema, config)?;
        let mut d = ResourceData::new(schema, planned, Timeouts::default());
        data_source
            .read(&self.ctx.config, &mut d)
            .await
            .inspect_err(log_failure)?;
        Ok(ResourceState {
            mode: ResourceMode::Data,
            type_name: type_name.to_string(),
            name: name.to_string(),
            id: d.id().to_string(),
            attributes: d.state(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::registry::ResourceRegistry;
    use crate::schema::{Schema, enable_force_new_schema, region_schema};
    use crate::traits::DataSource;

    /// In-memory resource: objects live in a map keyed by ID.
    #[derive(Default)]
    struct FakeVault {
        objects: Mutex<HashMap<String, Value>>,
        next_id: Mutex<u32>,
    }

    #[async_trait]
    impl Resource for FakeVault {
        fn type_name(&self) -> &'static str {
            "fake_vault"
        }

        fn schema(&self) -> SchemaMap {
            BTreeMap::from([
                ("region", region_schema()),
                ("name", Schema::string().required()),
                ("size", Schema::int().required()),
                ("zone", Schema::string().optional().force_new()),
                ("kind", Schema::string().optional()),
                ("enable_force_new", enable_force_new_schema()),
                ("status", Schema::string().computed()),
            ])
        }

        fn non_updatable_params(&self) -> &'static [&'static str] {
            &["kind"]
        }

        async fn create(&self, _cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
            let mut next = self.next_id.lock().await;
            *next += 1;
            let id = format!("vault-{next}");
            self.objects
                .lock()
                .await
                .insert(
                    id.clone(),
                    json!({"name": d.get_string("name"), "size": d.get_int("size"), "seen_status": d.get_string("status")}),
                );
            d.set_id(id);
            Ok(())
        }

        async fn read(&self, cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
            let found = self.objects.lock().await.get(d.id()).cloned();
            let Some(obj) = found else {
                d.set_id("");
                return Ok(());
            };
            d.set("region", cfg.get_region(d))?;
            d.set("name", obj["name"].clone())?;
            d.set("size", obj["size"].clone())?;
            d.set("status", "available")
        }

        async fn update(&self, _cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
            if d.has_change("size") {
                let size = d.get_int("size");
                if let Some(obj) = self.objects.lock().await.get_mut(d.id()) {
                    obj["size"] = json!(size);
                }
            }
            Ok(())
        }

        async fn delete(&self, _cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
            match self.objects.lock().await.remove(d.id()) {
                Some(_) => Ok(()),
                None => Err(ProviderError::ResourceNotFound(d.id().to_string())),
            }
        }
    }

    struct FakeVaults;

    #[async_trait]
    impl DataSource for FakeVaults {
        fn type_name(&self) -> &'static str {
            "fake_vaults"
        }

        fn schema(&self) -> SchemaMap {
            BTreeMap::from([
                ("name", Schema::string().optional()),
                ("ids", Schema::list(Schema::string()).computed()),
            ])
        }

        async fn read(&self, _cfg: &Config, d: &mut ResourceData) -> ProviderResult<()> {
            let name = d.get_string("name");
            d.set("ids", json!([format!("{name}-1")]))?;
            d.set_id("query-1");
            Ok(())
        }
    }

    fn service() -> (LifecycleService, Arc<FakeVault>) {
        let vault = Arc::new(FakeVault::default());
        let mut registry = ResourceRegistry::new();
        registry.register_resource(vault.clone());
        registry.register_data_source(Arc::new(FakeVaults));
        let config = Config::builder()
            .region("cn-north-4")
            .credentials("ak", "sk")
            .project_id("p1")
            .build()
            .unwrap();
        let ctx = ServiceContext::new(Arc::new(config), Arc::new(registry));
        (LifecycleService::new(Arc::new(ctx)), vault)
    }

    fn config(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_update_noop_destroy() {
        let (svc, vault) = service();
        let cfg = config(json!({"name": "backup", "size": 100}));

        let plan = svc.plan("fake_vault", &cfg, None).unwrap();
        assert_eq!(plan.action, PlanAction::Create);

        let state = svc.apply("fake_vault", "main", &cfg, None).await.unwrap();
        assert_eq!(state.id, "vault-1");
        assert_eq!(state.attributes["status"], "available");
        assert_eq!(state.attributes["region"], "cn-north-4");

        let plan = svc.plan("fake_vault", &cfg, Some(&state)).unwrap();
        assert_eq!(plan.action, PlanAction::NoOp);

        let bigger = config(json!({"name": "backup", "size": 200}));
        let plan = svc.plan("fake_vault", &bigger, Some(&state)).unwrap();
        assert_eq!(plan.action, PlanAction::Update);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.planned["status"], "available");

        let state = svc.apply("fake_vault", "main", &bigger, Some(&state)).await.unwrap();
        assert_eq!(state.id, "vault-1");
        assert_eq!(state.attributes["size"], 200);

        svc.destroy(&state).await.unwrap();
        assert!(vault.objects.lock().await.is_empty());
        // Destroying twice is fine.
        assert!(svc.destroy(&state).await.is_ok());
        assert!(svc.refresh(&state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn force_new_replaces() {
        let (svc, vault) = service();
        let state = svc
            .apply("fake_vault", "main", &config(json!({"name": "a", "size": 1, "zone": "az1"})), None)
            .await
            .unwrap();

        assert_eq!(state.attributes["status"], "available");

        let moved = config(json!({"name": "a", "size": 1, "zone": "az2"}));
        let plan = svc.plan("fake_vault", &moved, Some(&state)).unwrap();
        assert_eq!(plan.action, PlanAction::Replace);
        assert!(plan.planned.get("status").is_none_or(Value::is_null), "{:?}", plan.planned);

        let state = svc.apply("fake_vault", "main", &moved, Some(&state)).await.unwrap();
        assert_eq!(state.id, "vault-2");
        let objects = vault.objects.lock().await;
        assert_eq!(objects.len(), 1);
        // the old object's computed status is not sent to the new create
        assert_eq!(objects["vault-2"]["seen_status"], "");
    }

    #[tokio::test]
    async fn non_updatable_needs_enable_force_new() {
        let (svc, _) = service();
        let state = svc
            .apply("fake_vault", "main", &config(json!({"name": "a", "size": 1, "kind": "x"})), None)
            .await
            .unwrap();

        let changed = config(json!({"name": "a", "size": 1, "kind": "y"}));
        assert!(matches!(
            svc.plan("fake_vault", &changed, Some(&state)),
            Err(ProviderError::Plan(m)) if m.contains("[kind]")
        ));

        let forced = config(json!({"name": "a", "size": 1, "kind": "y", "enable_force_new": "true"}));
        let plan = svc.plan("fake_vault", &forced, Some(&state)).unwrap();
        assert_eq!(plan.action, PlanAction::Replace);
    }

    #[tokio::test]
    async fn validation_and_timeouts() {
        let (svc, _) = service();
        let err = svc.plan("fake_vault", &config(json!({"size": "big", "extra": 1})), None);
        assert!(matches!(err, Err(ProviderError::Validation(m)) if m.contains("name: required") && m.contains("extra: unsupported")));

        let plan = svc
            .plan("fake_vault", &config(json!({"name": "a", "size": 1, "timeouts": {"create": "30m"}})), None)
            .unwrap();
        assert_eq!(plan.timeouts.create, std::time::Duration::from_secs(1800));
        assert!(!plan.planned.contains_key("timeouts"));

        assert!(matches!(
            svc.plan("nope", &Map::new(), None),
            Err(ProviderError::UnknownResourceType(_))
        ));
    }

    #[tokio::test]
    async fn import_reads_existing_or_fails() {
        let (svc, _) = service();
        let created = svc
            .apply("fake_vault", "main", &config(json!({"name": "a", "size": 5})), None)
            .await
            .unwrap();

        let imported = svc.import("fake_vault", "copy", &created.id).await.unwrap();
        assert_eq!(imported.name, "copy");
        assert_eq!(imported.attributes["size"], 5);

        // Import followed by plan of the same configuration is a no-op.
        let plan = svc
            .plan("fake_vault", &config(json!({"name": "a", "size": 5})), Some(&imported))
            .unwrap();
        assert_eq!(plan.action, PlanAction::NoOp);

        assert!(matches!(
            svc.import("fake_vault", "ghost", "vault-404").await,
            Err(ProviderError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn data_source_read() {
        let (svc, _) = service();
        let state = svc
            .read_data_source("fake_vaults", "all", &config(json!({"name": "db"})))
            .await
            .unwrap();
        assert_eq!(state.mode, ResourceMode::Data);
        assert_eq!(state.id, "query-1");
        assert_eq!(state.attributes["ids"], json!(["db-1"]));
        assert_eq!(state.address(), "data.fake_vaults.all");
    }
}
