use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, error, info, warn};

use super::destination::Destination;
use super::registry::{EndpointStore, NameMatcher};
use super::spec::{Route, RouteSpec, RouteTable};
use crate::filters::{Filter, FilterNode, Pipe};
use crate::sink::{downgrade, Sink};
use crate::stats::StatsSnapshot;

/// The live nodes compiled for one source.
///
/// Nodes reference each other weakly; the graph is what keeps them alive. Dropping it stops
/// all delivery through its filters.
pub struct Graph {
    root: Rc<Destination>,
    filters: Vec<Rc<FilterNode>>,
    destinations: Vec<Rc<Destination>>,
}

impl Graph {
    fn new() -> Self {
        Graph {
            root: Rc::new(Destination::new()),
            filters: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// Where the source's input is written.
    pub fn root(&self) -> &Rc<Destination> {
        &self.root
    }

    /// Filters in tree order, each before the filters of its outputs.
    pub fn filters(&self) -> &[Rc<FilterNode>] {
        &self.filters
    }

    /// Filter output destinations, in creation order.
    pub fn destinations(&self) -> &[Rc<Destination>] {
        &self.destinations
    }

    pub fn stats(&self) -> Vec<StatsSnapshot> {
        self.filters.iter().map(|f| f.stats()).collect()
    }

    fn output(&mut self) -> Rc<Destination> {
        let dst = Rc::new(Destination::new());
        self.destinations.push(Rc::clone(&dst));
        dst
    }

    /// Write a buffer of source input.
    pub fn write(&self, buf: &[u8]) -> usize {
        self.root.write(buf)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("root", &self.root)
            .field("filters", &self.filters.iter().map(|f| f.name()).collect::<Vec<_>>())
            .field("destinations", &self.destinations.len())
            .finish()
    }
}

struct ClientEntry {
    // owned here, the store only holds it weakly
    _write_end: Option<Rc<dyn Sink>>,
    graph: Graph,
}

/// Compiles routes into graphs and owns the graphs of every source and client.
///
/// Construction registers every endpoint a route writes to, so that write ends and graphs
/// can be attached in any order afterwards.
pub struct Router {
    store: EndpointStore,
    routes: Vec<Route>,
    sources: HashMap<String, Graph>,
    clients: HashMap<String, ClientEntry>,
}

impl Router {
    /// Register the endpoints of every route. A route referencing an invalid pattern is logged
    /// and dropped.
    pub fn new(table: RouteTable) -> Self {
        let mut store = EndpointStore::new();
        let mut routes = Vec::with_capacity(table.len());
        for route in table {
            let leaves = route.spec.leaves();
            if let Some(err) = leaves.iter().find_map(|l| NameMatcher::parse(l).err()) {
                error!(route = %route.name, "{err}, skipped");
                continue;
            }
            for leaf in leaves {
                if let Err(err) = store.register_name(leaf) {
                    error!(route = %route.name, endpoint = leaf, "{err}");
                }
            }
            routes.push(route);
        }
        info!(routes = routes.len(), "route table loaded");
        Router {
            store,
            routes,
            sources: HashMap::new(),
            clients: HashMap::new(),
        }
    }

    pub fn store(&self) -> &EndpointStore {
        &self.store
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Build a fresh graph for the source `name` from every route whose source matches it.
    ///
    /// Each call creates new filters, so two graphs never share parser state.
    pub fn compile(&self, name: &str) -> Graph {
        let mut graph = Graph::new();
        let root = Rc::clone(&graph.root);
        for route in self.routes.iter().filter(|r| r.source.matches(name)) {
            debug!(route = %route.name, source = name, "compiling");
            self.build(&route.name, &route.spec, &root, &mut graph);
        }
        debug!(source = name, filters = graph.filters.len(), members = root.len(), "compiled");
        graph
    }

    fn build(&self, route: &str, spec: &RouteSpec, dest: &Destination, graph: &mut Graph) {
        match spec {
            RouteSpec::Leaf(endpoint) => {
                if self.store.connect_to_dest(endpoint, dest) == 0 {
                    warn!(route, endpoint = %endpoint, "no such endpoint");
                }
            }
            RouteSpec::Seq(items) => {
                for item in items {
                    self.build(route, item, dest, graph);
                }
            }
            RouteSpec::Node { filter, dst, rest } => {
                let instance = match Filter::from_spec(filter) {
                    Ok(Some(f)) => f,
                    Ok(None) => {
                        error!(route, filter = ?filter.kind, "unknown filter, branch skipped");
                        return;
                    }
                    Err(err) => {
                        error!(route, "{err}, branch skipped");
                        return;
                    }
                };
                // the node goes in before its subtrees, so filters are in tree order
                let next = dst.as_ref().map(|_| graph.output());
                let other = rest.as_ref().map(|_| graph.output());
                let mut pipe = Pipe::new();
                if let Some(next) = &next {
                    pipe = pipe.with_next(downgrade(next));
                }
                if let Some(other) = &other {
                    pipe = pipe.with_rest(downgrade(other));
                }
                let node = Rc::new(FilterNode::new(instance, pipe));
                dest.add(downgrade(&node));
                graph.filters.push(node);

                if let (Some(spec), Some(next)) = (dst, &next) {
                    self.build(route, spec, next, graph);
                }
                if let (Some(spec), Some(other)) = (rest, &other) {
                    self.build(route, spec, other, graph);
                }
            }
        }
    }

    /// Compile and keep the graph of a static endpoint, replacing any previous one.
    /// Returns where the endpoint's input is written.
    pub fn add_source(&mut self, name: &str) -> Rc<Destination> {
        let graph = self.compile(name);
        let root = Rc::clone(&graph.root);
        if self.sources.insert(name.to_string(), graph).is_some() {
            debug!(source = name, "source graph replaced");
        }
        root
    }

    pub fn remove_source(&mut self, name: &str) -> bool {
        self.sources.remove(name).is_some()
    }

    pub fn source(&self, name: &str) -> Option<&Graph> {
        self.sources.get(name)
    }

    /// Attach the write end of endpoint `name`; see [EndpointStore::register_write_end].
    pub fn register_write_end(&self, name: &str, sink: Weak<dyn Sink>) -> usize {
        self.store.register_write_end(name, sink)
    }

    pub fn connect_to_dest(&self, name: &str, dest: &Destination) -> usize {
        self.store.connect_to_dest(name, dest)
    }

    /// Set up a client accepted by the server endpoint `source`.
    ///
    /// The client's write end, if any, is attached under both the client and the server name.
    /// The client gets its own graph, compiled for its name, which also feeds the server's
    /// graph. A previous client of the same name is replaced.
    pub fn connect_client(
        &mut self,
        source: &str,
        client: &str,
        write_end: Option<Rc<dyn Sink>>,
    ) -> Rc<Destination> {
        if let Some(sink) = &write_end {
            self.store.register_write_end(client, Rc::downgrade(sink));
            self.store.register_write_end(source, Rc::downgrade(sink));
        }
        let graph = self.compile(client);
        match self.sources.get(source) {
            Some(src) => graph.root.add(downgrade(&src.root)),
            None => warn!(source, client, "client of an unknown source"),
        }
        let root = Rc::clone(&graph.root);
        let entry = ClientEntry {
            _write_end: write_end,
            graph,
        };
        if self.clients.insert(client.to_string(), entry).is_some() {
            debug!(client, "client replaced");
        }
        info!(source, client, "client connected");
        root
    }

    pub fn disconnect_client(&mut self, name: &str) -> bool {
        let found = self.clients.remove(name).is_some();
        if found {
            info!(client = name, "client disconnected");
        }
        found
    }

    pub fn client(&self, name: &str) -> Option<&Graph> {
        self.clients.get(name).map(|c| &c.graph)
    }

    /// Counters of every filter of every source and client, keyed by entry name.
    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        let sources = self.sources.iter();
        let clients = self.clients.iter().map(|(name, c)| (name, &c.graph));
        let mut out: Vec<(String, StatsSnapshot)> = sources
            .chain(clients)
            .flat_map(|(name, graph)| graph.stats().into_iter().map(move |s| (name.clone(), s)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
