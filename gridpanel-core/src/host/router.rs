//! Server-side ajax dispatch: `<prefix>_<entity>_<list|details|tab>`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::query::{ListRequest, QueryEngine};

use super::detail::{CapabilityCheck, DetailProvider};
use super::envelope::AjaxEnvelope;

/// Handlers of one entity.
pub struct EntityRoute {
    engine: QueryEngine,
    detail: Option<Arc<dyn DetailProvider>>,
    capability: String,
}

impl EntityRoute {
    /// Route an entity's list requests to `engine`, guarded by `capability`.
    pub fn new(engine: QueryEngine, capability: impl Into<String>) -> Self {
        Self {
            engine,
            detail: None,
            capability: capability.into(),
        }
    }

    /// Serve `details` and `tab` requests.
    pub fn detail(mut self, provider: Arc<dyn DetailProvider>) -> Self {
        self.detail = Some(provider);
        self
    }

    pub fn entity(&self) -> &str {
        &self.engine.entity().name
    }
}

/// Dispatches the host's ajax actions to entity handlers.
pub struct AjaxRouter {
    prefix: String,
    routes: HashMap<String, EntityRoute>,
    capabilities: Arc<dyn CapabilityCheck>,
}

impl AjaxRouter {
    pub fn new(prefix: impl Into<String>, capabilities: Arc<dyn CapabilityCheck>) -> Self {
        Self {
            prefix: prefix.into(),
            routes: HashMap::new(),
            capabilities,
        }
    }

    /// Add an entity's handlers.
    pub fn route(&mut self, route: EntityRoute) -> Result<&mut Self> {
        let entity = route.entity().to_string();
        if self.routes.contains_key(&entity) {
            return Err(Error::config(format!("entity '{}' is already routed", entity)));
        }
        self.routes.insert(entity, route);
        Ok(self)
    }

    /// Every action name this router answers.
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self
            .routes
            .iter()
            .flat_map(|(entity, route)| {
                let ops: &[&str] = if route.detail.is_some() {
                    &["list", "details", "tab"]
                } else {
                    &["list"]
                };
                ops.iter()
                    .map(move |op| format!("{}_{}_{}", self.prefix, entity, op))
            })
            .collect();
        actions.sort();
        actions
    }

    /// Handle one request and wrap the outcome in the ajax envelope.
    pub fn dispatch(&self, action: &str, params: &Map<String, Value>) -> AjaxEnvelope {
        match self.handle(action, params) {
            Ok(data) => AjaxEnvelope::ok(data),
            Err(e) => {
                warn!(action, error = %e, "ajax request failed");
                AjaxEnvelope::fail(e.to_string())
            }
        }
    }

    fn handle(&self, action: &str, params: &Map<String, Value>) -> Result<Value> {
        let (entity, operation) = self
            .split_action(action)
            .ok_or_else(|| Error::NotFound(format!("unknown action '{}'", action)))?;
        let route = self
            .routes
            .get(entity)
            .ok_or_else(|| Error::NotFound(format!("unknown entity '{}'", entity)))?;
        if !self.capabilities.allows(&route.capability) {
            return Err(Error::PermissionDenied(format!(
                "'{}' requires '{}'",
                action, route.capability
            )));
        }
        debug!(entity, operation, "dispatching ajax action");

        match operation {
            "list" => {
                let request = list_request(params)?;
                Ok(serde_json::to_value(route.engine.process(&request))?)
            }
            "details" => {
                let provider = detail_provider(route, action)?;
                let record_id = param_i64(params, "id")?;
                Ok(serde_json::to_value(provider.detail(record_id)?)?)
            }
            "tab" => {
                let provider = detail_provider(route, action)?;
                let record_id = param_i64(params, "id")?;
                let tab = params
                    .get("tab")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| Error::protocol("missing 'tab' parameter"))?;
                Ok(serde_json::to_value(provider.tab(record_id, tab)?)?)
            }
            _ => Err(Error::NotFound(format!("unknown action '{}'", action))),
        }
    }

    /// `<prefix>_<entity>_<operation>`; entity names may contain underscores.
    fn split_action<'a>(&self, action: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = action.strip_prefix(self.prefix.as_str())?.strip_prefix('_')?;
        let (entity, operation) = rest.rsplit_once('_')?;
        (!entity.is_empty()).then_some((entity, operation))
    }
}

fn detail_provider<'a>(route: &'a EntityRoute, action: &str) -> Result<&'a dyn DetailProvider> {
    route
        .detail
        .as_deref()
        .ok_or_else(|| Error::NotFound(format!("'{}' has no detail view", action)))
}

/// The list request either arrives JSON-encoded under `request`, nested
/// as an object, or as the parameters themselves.
fn list_request(params: &Map<String, Value>) -> Result<ListRequest> {
    let request = match params.get("request") {
        Some(Value::String(encoded)) => serde_json::from_str(encoded)?,
        Some(nested @ Value::Object(_)) => serde_json::from_value(nested.clone())?,
        _ => serde_json::from_value(Value::Object(params.clone()))?,
    };
    Ok(request)
}

fn param_i64(params: &Map<String, Value>, key: &str) -> Result<i64> {
    let value = params
        .get(key)
        .ok_or_else(|| Error::protocol(format!("missing '{}' parameter", key)))?;
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::protocol(format!("'{}' is not an integer", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::detail::StaticCapabilities;
    use crate::panel::{DetailPayload, TabPayload};
    use crate::query::{EntityDefinition, EscapingFormatter, SqliteRowStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct OrderDetails;

    impl DetailProvider for OrderDetails {
        fn detail(&self, record_id: i64) -> Result<DetailPayload> {
            if record_id == 404 {
                return Err(Error::NotFound(format!("order {}", record_id)));
            }
            Ok(DetailPayload::new(format!("Order #{}", record_id))
                .with_tab("overview", "<p>overview</p>"))
        }

        fn tab(&self, record_id: i64, tab: &str) -> Result<TabPayload> {
            Ok(TabPayload::new(format!("<p>{} of {}</p>", tab, record_id)))
        }
    }

    fn engine() -> QueryEngine {
        let store = SqliteRowStore::in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT);
                 INSERT INTO orders VALUES (1, 'Acme'), (2, 'Globex'), (3, 'Acme West');",
            )
            .unwrap();
        let entity = EntityDefinition::new("sales_order", "orders")
            .column("t.customer")
            .column("t.id")
            .searchable("t.customer");
        QueryEngine::new(entity, Arc::new(store), Arc::new(EscapingFormatter)).unwrap()
    }

    fn router(caps: StaticCapabilities) -> AjaxRouter {
        let mut router = AjaxRouter::new("gp", Arc::new(caps));
        router
            .route(EntityRoute::new(engine(), "manage_orders").detail(Arc::new(OrderDetails)))
            .unwrap();
        router
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_list_dispatch() {
        let router = router(StaticCapabilities::new().grant("manage_orders"));
        let envelope = router.dispatch(
            "gp_sales_order_list",
            &params(json!({"draw": 3, "start": 0, "length": 10, "search": {"value": "acme"}})),
        );
        assert!(envelope.success);
        assert_eq!(envelope.data["draw"], json!(3));
        assert_eq!(envelope.data["recordsTotal"], json!(3));
        assert_eq!(envelope.data["recordsFiltered"], json!(2));
    }

    #[test]
    fn test_list_request_json_encoded() {
        let router = router(StaticCapabilities::new().grant("manage_orders"));
        let request = serde_json::to_string(&ListRequest::new(9).page(0, 1)).unwrap();
        let envelope = router.dispatch("gp_sales_order_list", &params(json!({"request": request})));
        assert!(envelope.success);
        assert_eq!(envelope.data["draw"], json!(9));
        assert_eq!(envelope.data["data"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_details_and_tab() {
        let router = router(StaticCapabilities::new().grant("manage_orders"));
        let details = router.dispatch("gp_sales_order_details", &params(json!({"id": "7"})));
        assert!(details.success);
        let payload: DetailPayload = details.into_result().unwrap();
        assert_eq!(payload.title, "Order #7");

        let tab = router.dispatch(
            "gp_sales_order_tab",
            &params(json!({"id": 7, "tab": "history"})),
        );
        let payload: TabPayload = tab.into_result().unwrap();
        assert_eq!(payload.html, "<p>history of 7</p>");
    }

    #[test]
    fn test_failures_use_envelope() {
        let router = router(StaticCapabilities::new().grant("manage_orders"));
        let missing = router.dispatch("gp_sales_order_details", &Map::new());
        assert!(!missing.success);
        assert!(missing.message().is_some());

        let not_found = router.dispatch("gp_sales_order_details", &params(json!({"id": 404})));
        assert!(!not_found.success);

        assert!(!router.dispatch("gp_invoice_list", &Map::new()).success);
        assert!(!router.dispatch("other_sales_order_list", &Map::new()).success);
        assert!(!router.dispatch("gp_sales_order_delete", &Map::new()).success);
    }

    #[test]
    fn test_capability_denied() {
        let router = router(StaticCapabilities::new());
        let envelope = router.dispatch("gp_sales_order_list", &Map::new());
        assert!(!envelope.success);
        assert!(envelope.message().unwrap_or_default().contains("manage_orders"));
    }

    #[test]
    fn test_actions_and_duplicates() {
        let mut router = router(StaticCapabilities::new());
        assert_eq!(
            router.actions(),
            vec![
                "gp_sales_order_details".to_string(),
                "gp_sales_order_list".to_string(),
                "gp_sales_order_tab".to_string(),
            ]
        );
        assert!(router.route(EntityRoute::new(engine(), "manage_orders")).is_err());
    }
}
