use std::io::{stdout, Write};

use anyhow::Result;
use serde::Serialize;
use uav_router::config::RouterConfig;
use uav_router::routing::{Graph, RouteSpec, Router};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RouteSummary {
    name: String,
    source: String,
    tree: String,
    endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GraphSummary {
    source: String,
    routes: Vec<String>,
    filters: Vec<&'static str>,
    destinations: usize,
    root_members: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Report {
    routes: Vec<RouteSummary>,
    endpoints: Vec<String>,
    sources: Vec<GraphSummary>,
}

/// One line rendering of a destination tree, e.g. `nmea { dst: gps, rest: [junk, log] }`.
fn describe(spec: &RouteSpec) -> String {
    match spec {
        RouteSpec::Leaf(name) => name.clone(),
        RouteSpec::Seq(items) => {
            let items: Vec<String> = items.iter().map(describe).collect();
            format!("[{}]", items.join(", "))
        }
        RouteSpec::Node { filter, dst, rest } => {
            let mut parts = Vec::new();
            if let Some(dst) = dst {
                parts.push(format!("dst: {}", describe(dst)));
            }
            if let Some(rest) = rest {
                parts.push(format!("rest: {}", describe(rest)));
            }
            let kind = filter.kind.as_deref().unwrap_or("?");
            format!("{kind} {{ {} }}", parts.join(", "))
        }
    }
}

fn summarize(router: &Router, source: &str, graph: &Graph) -> GraphSummary {
    GraphSummary {
        source: source.to_string(),
        routes: router
            .routes()
            .iter()
            .filter(|r| r.source.matches(source))
            .map(|r| r.name.clone())
            .collect(),
        filters: graph.filters().iter().map(|f| f.name()).collect(),
        destinations: graph.destinations().len(),
        root_members: graph.root().len(),
    }
}

fn report(cfg: &RouterConfig, sources: &[String]) -> Report {
    let router = Router::new(cfg.routes.clone());
    let routes = router
        .routes()
        .iter()
        .map(|r| RouteSummary {
            name: r.name.clone(),
            source: r.source.to_string(),
            tree: describe(&r.spec),
            endpoints: r.spec.leaves().iter().map(|l| l.to_string()).collect(),
        })
        .collect();
    let mut endpoints: Vec<String> = router.store().names().map(str::to_string).collect();
    endpoints.sort();
    let sources = sources
        .iter()
        .map(|name| summarize(&router, name, &router.compile(name)))
        .collect();
    Report {
        routes,
        endpoints,
        sources,
    }
}

fn write_text<W: Write>(mut out: W, report: &Report) -> Result<()> {
    writeln!(out, "Routes:")?;
    for route in &report.routes {
        writeln!(out, "  {} ({}): {}", route.name, route.source, route.tree)?;
    }
    writeln!(out, "Endpoints: {}", report.endpoints.join(", "))?;
    for graph in &report.sources {
        writeln!(out, "Source {}:", graph.source)?;
        writeln!(out, "  routes:       {}", graph.routes.join(", "))?;
        writeln!(out, "  filters:      {}", graph.filters.join(", "))?;
        writeln!(out, "  destinations: {}", graph.destinations)?;
        writeln!(out, "  root members: {}", graph.root_members)?;
    }
    Ok(())
}

pub fn check(cfg: &RouterConfig, sources: &[String], format: &Format) -> Result<()> {
    let report = report(cfg, sources);
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &report)?;
            println!();
        }
        Format::Text => write_text(stdout().lock(), &report)?,
    }
    Ok(())
}
