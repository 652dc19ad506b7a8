//! Route table parsed from configuration.
//!
//! ```yaml
//! routes:
//!   telemetry:
//!     src: [uart0, /^tcp.*$/]
//!     dst:
//!       type: mavlink1
//!       dst: [gcs, log]
//!       rest: { type: nmea, dst: gps }
//! ```
use serde_yaml::{Mapping, Value};
use tracing::{error, warn};

use super::registry::NameMatcher;
use crate::filters::FilterSpec;
use crate::{Error, Result};

/// Destination tree of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSpec {
    /// Endpoint name or pattern.
    Leaf(String),
    /// Every element receives the same input.
    Seq(Vec<RouteSpec>),
    /// A filter with optional outputs.
    Node {
        filter: FilterSpec,
        dst: Option<Box<RouteSpec>>,
        rest: Option<Box<RouteSpec>>,
    },
}

impl RouteSpec {
    pub fn leaf(name: &str) -> Self {
        RouteSpec::Leaf(name.to_string())
    }

    pub fn node(filter: FilterSpec, dst: Option<RouteSpec>, rest: Option<RouteSpec>) -> Self {
        RouteSpec::Node {
            filter,
            dst: dst.map(Box::new),
            rest: rest.map(Box::new),
        }
    }

    /// Parse a destination tree: a string is a leaf, a list a sequence and a map a filter
    /// node with `type`, `dst`, `rest` and filter options.
    ///
    /// # Errors
    /// [Error::Route] naming `route` if any part of the tree is malformed.
    pub fn from_value(route: &str, value: &Value) -> Result<Self> {
        parse_tree(value).map_err(|reason| Error::Route {
            route: route.to_string(),
            reason,
        })
    }

    /// Every endpoint name referenced by the tree, in depth first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RouteSpec::Leaf(name) => out.push(name),
            RouteSpec::Seq(items) => items.iter().for_each(|s| s.collect_leaves(out)),
            RouteSpec::Node { dst, rest, .. } => {
                for child in [dst, rest].into_iter().flatten() {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

fn parse_tree(value: &Value) -> std::result::Result<RouteSpec, String> {
    if let Some(name) = scalar_name(value) {
        return Ok(RouteSpec::Leaf(name));
    }
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(parse_tree)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(RouteSpec::Seq),
        Value::Mapping(map) => parse_node(map),
        Value::Tagged(tagged) => parse_tree(&tagged.value),
        other => Err(format!("unexpected {} in destination", kind_of(other))),
    }
}

/// Endpoint name written as any scalar; `14550` names the endpoint "14550".
fn scalar_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_node(map: &Mapping) -> std::result::Result<RouteSpec, String> {
    let dst = map.get("dst").map(parse_tree).transpose()?;
    let rest = map.get("rest").map(parse_tree).transpose()?;
    if dst.is_none() && rest.is_none() {
        return Err("filter node without dst or rest".to_string());
    }
    let kind = match map.get("type") {
        None => None,
        Some(Value::String(kind)) => Some(kind.clone()),
        Some(other) => return Err(format!("filter type must be a string, got {}", kind_of(other))),
    };
    let crc_extra = map
        .get("crc_extra")
        .and_then(|v| parse_crc_extra(kind.as_deref().unwrap_or_default(), v));
    Ok(RouteSpec::node(FilterSpec { kind, crc_extra }, dst, rest))
}

// Not a list of bytes: warn and keep the default table.
fn parse_crc_extra(filter: &str, value: &Value) -> Option<Vec<u8>> {
    let Value::Sequence(items) = value else {
        warn!(filter, "crc_extra is not a list, using the default table");
        return None;
    };
    let table: Option<Vec<u8>> = items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect();
    if table.is_none() {
        warn!(filter, "crc_extra entries must be bytes, using the default table");
    }
    table
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "map",
        Value::Tagged(_) => "tagged value",
    }
}

/// One source of a route.
#[derive(Debug, Clone)]
pub struct Route {
    pub source: NameMatcher,
    pub name: String,
    pub spec: RouteSpec,
}

impl Route {
    /// # Errors
    /// [Error::Pattern] if `source` is an invalid pattern.
    pub fn new(source: &str, name: &str, spec: RouteSpec) -> Result<Self> {
        Ok(Route {
            source: NameMatcher::parse(source)?,
            name: name.to_string(),
            spec,
        })
    }

    /// Parse one entry of the `routes` map, `{ src, dst }`, into one route per source name.
    ///
    /// # Errors
    /// [Error::Route] if the entry is malformed, [Error::Pattern] for an invalid source
    /// pattern.
    pub fn from_value(name: &str, value: &Value) -> Result<Vec<Route>> {
        let invalid = |reason: &str| Error::Route {
            route: name.to_string(),
            reason: reason.to_string(),
        };
        let Value::Mapping(map) = value else {
            return Err(invalid("route must be a map"));
        };
        let sources: Vec<String> = match map.get("src") {
            None => return Err(invalid("missing src")),
            Some(Value::Sequence(items)) => items
                .iter()
                .map(scalar_name)
                .collect::<Option<_>>()
                .ok_or_else(|| invalid("src entries must be names"))?,
            Some(src) => vec![
                scalar_name(src).ok_or_else(|| invalid("src must be a name or a list of names"))?,
            ],
        };
        if sources.is_empty() {
            return Err(invalid("empty src"));
        }
        let dst = map.get("dst").ok_or_else(|| invalid("missing dst"))?;
        let spec = RouteSpec::from_value(name, dst)?;
        sources
            .into_iter()
            .map(|src| Route::new(&src, name, spec.clone()))
            .collect()
    }
}

/// Ordered list of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        RouteTable { routes }
    }

    /// Parse the `routes` section. Malformed routes are logged and skipped.
    ///
    /// # Errors
    /// [Error::Config] if the section is not a map.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Mapping(map) = value else {
            return Err(Error::Config("routes must be a map".to_string()));
        };
        let mut routes = Vec::new();
        for (key, value) in map {
            let Some(name) = scalar_name(key) else {
                error!(route = ?key, "route name must be a scalar, skipped");
                continue;
            };
            match Route::from_value(&name, value) {
                Ok(parsed) => routes.extend(parsed),
                Err(err) => error!(route = %name, "{err}, skipped"),
            }
        }
        Ok(RouteTable { routes })
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl IntoIterator for RouteTable {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn tree_forms() {
        let spec = RouteSpec::from_value(
            "r",
            &yaml("{ type: mavlink1, dst: [gcs, /^log.*$/], rest: { type: hex, dst: dump } }"),
        )
        .unwrap();
        let expected = RouteSpec::node(
            FilterSpec::new("mavlink1"),
            Some(RouteSpec::Seq(vec![RouteSpec::leaf("gcs"), RouteSpec::leaf("/^log.*$/")])),
            Some(RouteSpec::node(FilterSpec::new("hex"), Some(RouteSpec::leaf("dump")), None)),
        );
        assert_eq!(spec, expected);
        assert_eq!(spec.leaves(), vec!["gcs", "/^log.*$/", "dump"]);
    }

    #[test]
    fn node_needs_an_output() {
        let err = RouteSpec::from_value("r", &yaml("{ type: nmea }")).unwrap_err();
        assert!(matches!(err, Error::Route { .. }));
        assert!(RouteSpec::from_value("r", &yaml("[gcs, ~]")).is_err());
    }

    #[test]
    fn numeric_names_are_leaves() {
        let spec = RouteSpec::from_value("r", &yaml("[gcs, 14550, true]")).unwrap();
        assert_eq!(spec.leaves(), vec!["gcs", "14550", "true"]);

        let routes = Route::from_value("r", &yaml("{ src: 5760, dst: gcs }")).unwrap();
        assert!(routes[0].source.matches("5760"));
        let routes = Route::from_value("r", &yaml("{ src: [uart0, 14550], dst: gcs }")).unwrap();
        assert_eq!(routes[1].source.as_str(), "14550");
    }

    #[test]
    fn crc_extra_option() {
        let crc_extra = |doc: &str| match RouteSpec::from_value("r", &yaml(doc)).unwrap() {
            RouteSpec::Node { filter, .. } => filter.crc_extra,
            other => panic!("expected a node, got {other:?}"),
        };
        assert_eq!(
            crc_extra("{ type: mavlink1, crc_extra: [1, 2], dst: x }"),
            Some(vec![1, 2])
        );
        assert_eq!(crc_extra("{ type: mavlink1, crc_extra: 7, dst: x }"), None);
        assert_eq!(crc_extra("{ type: mavlink1, crc_extra: [1, 300], dst: x }"), None);
    }

    #[test]
    fn list_source_expands() {
        let routes = Route::from_value("r", &yaml("{ src: [a, /b.*/], dst: out }")).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes[1].source.matches("bee"));
        assert_eq!(routes[0].name, "r");
    }

    #[test]
    fn malformed_routes_are_skipped() {
        let table = RouteTable::from_value(&yaml(
            r"
            good: { src: a, dst: b }
            no_src: { dst: b }
            no_dst: { src: a }
            bad_tree: { src: a, dst: { type: nmea } }
            bad_pattern: { src: '/a(', dst: b }
            scalar: a
            ",
        ))
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().name, "good");
    }

    #[test]
    fn routes_must_be_a_map() {
        assert!(matches!(
            RouteTable::from_value(&yaml("[a, b]")),
            Err(Error::Config(_))
        ));
    }
}
