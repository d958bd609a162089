//! External Data Sources
//!
//! Loads, caches and invalidates option lists for select-style fields.
//! One [`DataSourceRegistry`] per form session owns every map involved; there
//! is no process-wide state.

mod cache;
mod coordinator;
mod transform;
mod transport;
mod types;
mod variables;

pub use cache::{CacheItem, CacheStore};
pub use coordinator::{
    FetchCoordinator, LoadFuture, OnSuccess, SharedLoad, SourceStateChange, StateObserver,
};
pub use transform::{normalize_option, to_options, Expression};
pub use transport::{FetchRequest, HttpTransport, Transport};
pub use types::{
    parse_sources, CachePolicy, DataSource, DataSourceState, SelectOption, SourceKind, Transform,
    TransformKind,
};
pub use variables::FormContext;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::{join_all, FutureExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::LoadError;

/// Registry of data sources for one form.
pub struct DataSourceRegistry {
    sources: Vec<Arc<DataSource>>,
    context: RwLock<FormContext>,
    cache: CacheStore,
    coordinator: FetchCoordinator,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
}

impl DataSourceRegistry {
    pub fn new(sources: Vec<DataSource>, context: FormContext, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(sources, context, transport, EngineConfig::default())
    }

    /// Later definitions replace earlier ones with the same id.
    pub fn with_config(
        sources: Vec<DataSource>,
        context: FormContext,
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Self {
        let coordinator = FetchCoordinator::new(config.request_timeout, config.event_capacity);

        let mut registered: Vec<Arc<DataSource>> = Vec::with_capacity(sources.len());
        for source in sources {
            coordinator.register(&source.id);
            match registered.iter().position(|s| s.id == source.id) {
                Some(index) => {
                    warn!("Data source {} defined twice, keeping the last definition", source.id);
                    registered[index] = Arc::new(source);
                }
                None => registered.push(Arc::new(source)),
            }
        }

        Self {
            sources: registered,
            context: RwLock::new(context),
            cache: CacheStore::new(),
            coordinator,
            transport,
            config,
        }
    }

    /// Register a synchronous `onStateChange` callback.
    pub fn with_observer(
        self,
        observer: impl Fn(&str, &DataSourceState) + Send + Sync + 'static,
    ) -> Self {
        self.coordinator.add_observer(Arc::new(observer));
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SourceStateChange> {
        self.coordinator.subscribe()
    }

    pub fn source(&self, source_id: &str) -> Option<&DataSource> {
        self.find(source_id).map(Arc::as_ref)
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id.as_str()).collect()
    }

    fn find(&self, source_id: &str) -> Option<&Arc<DataSource>> {
        self.sources.iter().find(|s| s.id == source_id)
    }

    fn context_snapshot(&self) -> FormContext {
        self.context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_context(&self, context: FormContext) {
        *self.context.write().unwrap_or_else(PoisonError::into_inner) = context;
    }

    /// Replace only the form values part of the context.
    pub fn update_values(&self, values: Value) {
        self.context
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .values = values;
    }

    pub fn get_state(&self, source_id: &str) -> DataSourceState {
        self.coordinator.state(source_id)
    }

    pub fn get_options(&self, source_id: &str) -> Vec<SelectOption> {
        self.get_state(source_id).data
    }

    pub fn is_loading(&self, source_id: &str) -> bool {
        self.get_state(source_id).loading
    }

    pub fn get_error(&self, source_id: &str) -> Option<String> {
        self.get_state(source_id).error
    }

    /// Load the options of `source_id`.
    ///
    /// Never fails: unknown ids, configuration problems and transport errors
    /// all resolve to an empty list, with the error recorded in the source
    /// state where one applies. A call made while a load of the same id is
    /// pending joins it, even with `force_refresh`.
    pub async fn load_source(&self, source_id: &str, force_refresh: bool) -> Vec<SelectOption> {
        let Some(source) = self.find(source_id).cloned() else {
            warn!("Data source {} does not exist", source_id);
            return Vec::new();
        };
        let context = self.context_snapshot();

        let cache_slot = source
            .cache
            .as_ref()
            .map(|policy| (self.cache_key(&source, &context), self.ttl(policy)));

        if !force_refresh {
            if let Some((key, ttl)) = &cache_slot {
                if let Some(data) = self.cache.get(key, *ttl) {
                    debug!("Cache hit for data source {} ({})", source_id, key);
                    return data;
                }
            }
        }

        let cache = self.cache.clone();
        let owner = source.id.clone();
        let write_through: OnSuccess = Box::new(move |data: &[SelectOption]| {
            if let Some((key, _)) = cache_slot {
                cache.set(&key, &owner, data.to_vec());
            }
        });

        self.coordinator
            .load(source_id, || self.loader(source, &context), write_through)
            .await
    }

    /// Ids of sources depending on `changed_field`; their cache entries are
    /// evicted immediately regardless of TTL.
    pub fn check_dependency_change(&self, changed_field: &str) -> Vec<String> {
        let mut affected = Vec::new();
        for source in self.sources.iter().filter(|s| s.depends_on(changed_field)) {
            let evicted = self.cache.evict_source(&source.id);
            debug!(
                "{} changed: evicted {} cache entries of {}",
                changed_field, evicted, source.id
            );
            affected.push(source.id.clone());
        }
        affected
    }

    /// Force-reload every source depending on `changed_field`, concurrently.
    pub async fn refresh_dependent_sources(&self, changed_field: &str) {
        let affected = self.check_dependency_change(changed_field);
        if affected.is_empty() {
            return;
        }
        info!("Refreshing {} data sources after {} changed", affected.len(), changed_field);
        join_all(affected.iter().map(|id| self.load_source(id, true))).await;
    }

    /// Load every source without dependencies. Dependent sources wait until
    /// their trigger fields change.
    pub async fn preload_all(&self) {
        let independent: Vec<&str> = self
            .sources
            .iter()
            .filter(|s| !s.has_dependencies())
            .map(|s| s.id.as_str())
            .collect();
        join_all(independent.into_iter().map(|id| self.load_source(id, false))).await;
    }

    pub fn invalidate_cache(&self, source_id: &str) {
        self.cache.evict_source(source_id);
    }

    pub fn clear_all_cache(&self) {
        self.cache.clear();
    }

    /// Abort the pending load of `source_id`; joined callers receive `[]`.
    pub fn cancel(&self, source_id: &str) -> bool {
        self.coordinator.cancel(source_id)
    }

    fn ttl(&self, policy: &CachePolicy) -> Duration {
        policy.ttl_or(self.config.default_ttl)
    }

    /// Keys are always namespaced by the source id, so sources sharing a
    /// key template never share entries.
    fn cache_key(&self, source: &DataSource, context: &FormContext) -> String {
        if let Some(template) = source.cache.as_ref().and_then(|c| c.key.as_deref()) {
            return format!("{}:{}", source.id, context.expand(template));
        }
        let params = source
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, context.expand(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}:{}", source.id, params)
    }

    fn loader(&self, source: Arc<DataSource>, context: &FormContext) -> LoadFuture {
        match source.kind {
            SourceKind::Static => {
                let data = source.data.clone();
                async move { Ok(data) }.boxed()
            }
            SourceKind::Terraform => {
                warn!("Data source {}: terraform sources are not supported", source.id);
                async { Ok(Vec::new()) }.boxed()
            }
            SourceKind::Api => {
                let Some(api) = source.api.as_deref() else {
                    warn!("Data source {} has no api url", source.id);
                    return async { Ok(Vec::new()) }.boxed();
                };

                let request = FetchRequest {
                    method: source.method.clone().unwrap_or_else(|| "GET".to_string()),
                    url: build_url(&context.expand(api), &source, context),
                    bearer_token: self.config.auth_token.clone(),
                };
                let transport = Arc::clone(&self.transport);

                async move {
                    let payload = transport.fetch(request).await.map_err(|e| {
                        error!("Request for data source {} failed: {}", source.id, e);
                        LoadError::from(e)
                    })?;
                    Ok(to_options(&payload, source.transform.as_ref()))
                }
                .boxed()
            }
        }
    }
}

/// Append expanded, non-empty params as an encoded query string.
fn build_url(base: &str, source: &DataSource, context: &FormContext) -> String {
    let query = source
        .params
        .iter()
        .filter_map(|(key, template)| {
            let value = context.expand(template);
            (!value.is_empty()).then(|| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
            })
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        base.to_string()
    } else if base.contains('?') {
        format!("{}&{}", base, query)
    } else {
        format!("{}?{}", base, query)
    }
}
