//! Architecture Verification Suite
//!
//! Compile-time guarantees the form host relies on: shared engine parts are
//! thread-safe and the transport seam stays object-safe.

#[cfg(test)]
mod architecture_tests {
    use std::sync::Arc;

    use form_cascade::cascade::{CascadeEngine, CascadeState, Rule};
    use form_cascade::datasource::{
        CacheStore, DataSourceRegistry, FetchCoordinator, FormContext, HttpTransport, Transport,
    };

    fn assert_send_sync<T: Send + Sync>() {}

    // 1. Rule evaluation can run on any thread
    #[test]
    fn test_cascade_types_are_thread_safe() {
        assert_send_sync::<Rule>();
        assert_send_sync::<CascadeEngine>();
        assert_send_sync::<CascadeState>();
    }

    // 2. One registry is shared across tasks of a form session
    #[test]
    fn test_datasource_types_are_thread_safe() {
        assert_send_sync::<DataSourceRegistry>();
        assert_send_sync::<FetchCoordinator>();
        assert_send_sync::<CacheStore>();
        assert_send_sync::<FormContext>();
        assert_send_sync::<HttpTransport>();
    }

    // 3. Transports are swapped behind a trait object
    #[test]
    fn test_transport_is_object_safe() {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new());
        let _registry = DataSourceRegistry::new(vec![], FormContext::default(), transport);
    }

    // 4. Loads are spawnable
    #[tokio::test]
    async fn test_load_future_is_send() {
        let registry = Arc::new(DataSourceRegistry::new(
            vec![],
            FormContext::default(),
            Arc::new(HttpTransport::new()),
        ));
        let handle = tokio::spawn({
            let registry = registry.clone();
            async move { registry.load_source("missing", false).await }
        });
        assert!(handle.await.unwrap().is_empty());
    }
}
