//! Endpoint registry: the routing table the API fallback consults.
//!
//! Descriptors are registered and unregistered as whole resources come and
//! go, so the table lives in a `DashMap` instead of a static axum `Router`.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use http::Method;

use crate::pipeline::EndpointDescriptor;

/// Errors raised while registering endpoints.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{method} {pattern} is already registered by resource `{owner}`")]
    Conflict {
        method: Method,
        pattern: String,
        owner: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route pattern such as `/widgets/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/').filter(|s| !s.is_empty())
}

impl PathPattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Matches `path`, returning the captured parameters percent-decoded.
    /// A parameter that does not decode to UTF-8 fails the match.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }
        Some(params)
    }

    /// Literal segments win over parameters when two patterns match.
    fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }
}

/// Outcome of routing a request.
#[derive(Debug)]
pub enum RouteMatch {
    Found {
        endpoint: EndpointDescriptor,
        params: BTreeMap<String, String>,
    },
    /// The path is known but not under this method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

struct Route {
    pattern: PathPattern,
    endpoint: EndpointDescriptor,
}

/// Thread-safe table of registered endpoint descriptors.
#[derive(Default)]
pub struct EndpointRegistry {
    routes: DashMap<(Method, String), Route>,
}

impl EndpointRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every descriptor. Nothing is registered when any of them
    /// collides with a route owned by another resource.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] on the first collision.
    pub fn register(&self, endpoints: &[EndpointDescriptor]) -> Result<(), RegistryError> {
        for endpoint in endpoints {
            let key = (endpoint.method().clone(), endpoint.path().to_string());
            if let Some(existing) = self.routes.get(&key) {
                if !Arc::ptr_eq(existing.endpoint.resource(), endpoint.resource()) {
                    return Err(RegistryError::Conflict {
                        method: key.0,
                        pattern: key.1,
                        owner: existing.endpoint.resource().key().to_string(),
                    });
                }
            }
        }
        for endpoint in endpoints {
            self.routes.insert(
                (endpoint.method().clone(), endpoint.path().to_string()),
                Route {
                    pattern: PathPattern::parse(endpoint.path()),
                    endpoint: endpoint.clone(),
                },
            );
        }
        Ok(())
    }

    /// Removes the descriptors that are still owned by their resource.
    pub fn unregister(&self, endpoints: &[EndpointDescriptor]) {
        for endpoint in endpoints {
            let key = (endpoint.method().clone(), endpoint.path().to_string());
            self.routes
                .remove_if(&key, |_, route| Arc::ptr_eq(route.endpoint.resource(), endpoint.resource()));
        }
    }

    /// Finds the endpoint for `method` and `path`.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> RouteMatch {
        let mut best: Option<(usize, EndpointDescriptor, BTreeMap<String, String>)> = None;
        let mut allowed = Vec::new();

        for entry in self.routes.iter() {
            let route = entry.value();
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.endpoint.method() != method {
                allowed.push(route.endpoint.method().clone());
                continue;
            }
            let specificity = route.pattern.specificity();
            if best.as_ref().map_or(true, |(s, _, _)| specificity > *s) {
                best = Some((specificity, route.endpoint.clone(), params));
            }
        }

        match best {
            Some((_, endpoint, params)) => RouteMatch::Found { endpoint, params },
            None if !allowed.is_empty() => {
                allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                allowed.dedup();
                RouteMatch::MethodNotAllowed { allowed }
            }
            None => RouteMatch::NotFound,
        }
    }

    /// Registered `(method, pattern)` pairs, sorted.
    #[must_use]
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<(Method, String)> =
            self.routes.iter().map(|entry| entry.key().clone()).collect();
        routes.sort_by(|a, b| (a.1.as_str(), a.0.as_str()).cmp(&(b.1.as_str(), b.0.as_str())));
        routes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("routes", &self.routes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_endpoints;
    use crate::resource::testing::memory_resource;
    use crate::resource::{Resource, ResourceSpec};
    use crate::storage::StaticResolver;

    #[test]
    fn patterns_capture_parameters() {
        let pattern = PathPattern::parse("/widgets/:id");
        let params = pattern.matches("/widgets/7").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("7"));
        assert!(pattern.matches("/widgets/7/").is_some());
        assert!(pattern.matches("/widgets").is_none());
        assert!(pattern.matches("/gadgets/7").is_none());
        assert!(pattern.matches("/widgets/7/parts").is_none());
    }

    #[test]
    fn captured_parameters_are_percent_decoded() {
        let pattern = PathPattern::parse("/widgets/:id");
        let params = pattern.matches("/widgets/a%20b%2Fc").unwrap();
        assert_eq!(params["id"], "a b/c");
        assert!(pattern.matches("/widgets/%FF").is_none());

        let registry = EndpointRegistry::new();
        registry.register(&build_endpoints(&memory_resource("widgets"))).unwrap();
        match registry.match_route(&Method::GET, "/widgets/caf%C3%A9") {
            RouteMatch::Found { params, .. } => assert_eq!(params["id"], "café"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn routes_resolve_by_method_and_path() {
        let registry = EndpointRegistry::new();
        registry.register(&build_endpoints(&memory_resource("widgets"))).unwrap();
        assert_eq!(registry.len(), 6);

        match registry.match_route(&Method::PATCH, "/widgets/9") {
            RouteMatch::Found { endpoint, params } => {
                assert_eq!(endpoint.kind(), restkit_core::OperationKind::Patch);
                assert_eq!(params["id"], "9");
            }
            other => panic!("unexpected {other:?}"),
        }
        match registry.match_route(&Method::POST, "/widgets/9") {
            RouteMatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::DELETE, Method::GET, Method::PATCH, Method::PUT]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            registry.match_route(&Method::GET, "/gadgets"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn literal_segments_beat_parameters() {
        let registry = EndpointRegistry::new();
        let widgets = memory_resource("widgets");
        let featured = Resource::new(
            ResourceSpec::new("featured", "memory").with_path("widgets/featured"),
            Arc::new(StaticResolver::new()),
        )
        .unwrap();
        registry.register(&build_endpoints(&widgets)).unwrap();
        registry.register(&build_endpoints(&featured)).unwrap();

        match registry.match_route(&Method::GET, "/widgets/featured") {
            RouteMatch::Found { endpoint, .. } => assert_eq!(endpoint.resource().key(), "featured"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn conflicting_resources_are_rejected_whole() {
        let registry = EndpointRegistry::new();
        registry.register(&build_endpoints(&memory_resource("widgets"))).unwrap();
        let err = registry
            .register(&build_endpoints(&memory_resource("widgets")))
            .unwrap_err();
        assert!(err.to_string().contains("widgets"));
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn unregister_removes_only_the_owner_routes() {
        let registry = EndpointRegistry::new();
        let widgets = build_endpoints(&memory_resource("widgets"));
        let gadgets = build_endpoints(&memory_resource("gadgets"));
        registry.register(&widgets).unwrap();
        registry.register(&gadgets).unwrap();

        registry.unregister(&widgets);
        assert_eq!(registry.len(), 6);
        assert!(matches!(registry.match_route(&Method::GET, "/widgets"), RouteMatch::NotFound));

        registry.unregister(&widgets);
        assert_eq!(registry.len(), 6);
    }
}
