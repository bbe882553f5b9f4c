// Shipped GenerationSink implementations

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::{json, Map, Value};

use crate::aco_interface::{
    AgentKind, AgentRecord, GenerationId, GenerationRecord, GenerationSink, NetworkSnapshot,
    NodeId, ReplicateId, SinkError,
};
use crate::aco_network::Network;
use crate::aco_params::Params;

// ============================================================================
// In-memory Collector
// ============================================================================

/// Keeps everything it is given
#[derive(Debug, Default)]
pub struct CollectorSink {
    pub optimal_routes: Vec<(ReplicateId, Vec<NodeId>)>,
    pub snapshots: Vec<(ReplicateId, GenerationId, NetworkSnapshot)>,
    pub records: Vec<(ReplicateId, GenerationRecord)>,
    pub finished: Vec<ReplicateId>,
    skip_snapshots: bool,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that only keeps agent records
    pub fn without_snapshots() -> Self {
        Self {
            skip_snapshots: true,
            ..Self::default()
        }
    }

    /// Every record of one agent kind, in generation order
    pub fn agent_records(&self, kind: AgentKind) -> impl Iterator<Item = &AgentRecord> + '_ {
        self.records
            .iter()
            .filter_map(move |(_, record)| record.agent(kind))
    }
}

impl GenerationSink for CollectorSink {
    fn topology_built(
        &mut self,
        replicate: ReplicateId,
        network: &mut Network,
    ) -> Result<(), SinkError> {
        self.optimal_routes
            .push((replicate, network.optimal_route_ids()));
        Ok(())
    }

    fn wants_snapshots(&self) -> bool {
        !self.skip_snapshots
    }

    fn network_snapshot(
        &mut self,
        replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        self.snapshots.push((replicate, generation, snapshot.clone()));
        Ok(())
    }

    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        self.records.push((replicate, record.clone()));
        Ok(())
    }

    fn finish(&mut self, replicate: ReplicateId) -> Result<(), SinkError> {
        self.finished.push(replicate);
        Ok(())
    }
}

// ============================================================================
// Console
// ============================================================================

/// One `info!` line per agent result
#[derive(Debug, Default)]
pub struct LoggingSink;

impl GenerationSink for LoggingSink {
    fn wants_snapshots(&self) -> bool {
        false
    }

    fn network_snapshot(
        &mut self,
        _replicate: ReplicateId,
        _generation: GenerationId,
        _snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        for agent in &record.agents {
            info!(
                "[sim {} gen {}] {:<8} {:?} route {:?} widths {:?} bottleneck {}",
                replicate,
                record.generation,
                agent.kind.as_str(),
                agent.state,
                agent.route,
                agent.route_width,
                agent.route_bottleneck
            );
        }
        Ok(())
    }
}

// ============================================================================
// JSON Document
// ============================================================================

/// Nested document of a whole replicate, written once on `finish`:
///
/// ```text
/// { "params": {..},
///   "simulation0": {
///     "generation0": {
///       "network": { "optimal": [..], "node3": { "node7": { "width": 100, "pheromone": 1000 } } },
///       "ant": {..}, "rand": {..}, "interest": {..} } } }
/// ```
pub struct JsonDocumentSink {
    path: PathBuf,
    params: Value,
    generations: IndexMap<GenerationId, Map<String, Value>>,
}

impl JsonDocumentSink {
    pub fn new<P: Into<PathBuf>>(path: P, params: &Params) -> Result<Self, SinkError> {
        Ok(Self {
            path: path.into(),
            params: serde_json::to_value(params)?,
            generations: IndexMap::new(),
        })
    }

    /// `dir/simulation<replicate>.json`
    pub fn in_dir(dir: &Path, replicate: ReplicateId, params: &Params) -> Result<Self, SinkError> {
        Self::new(dir.join(format!("simulation{}.json", replicate)), params)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document as it would be written now
    pub fn document(&self, replicate: ReplicateId) -> Value {
        let simulation: Map<String, Value> = self
            .generations
            .iter()
            .map(|(g, entry)| (format!("generation{}", g), Value::Object(entry.clone())))
            .collect();

        let mut document = Map::new();
        document.insert("params".to_string(), self.params.clone());
        document.insert(format!("simulation{}", replicate), Value::Object(simulation));
        Value::Object(document)
    }

    fn network_json(snapshot: &NetworkSnapshot) -> Value {
        let mut network = Map::new();
        network.insert("optimal".to_string(), json!(snapshot.optimal_route));
        for node in &snapshot.nodes {
            let edges: Map<String, Value> = node
                .edges
                .iter()
                .map(|e| {
                    (
                        format!("node{}", e.neighbor),
                        json!({ "width": e.width, "pheromone": e.pheromone }),
                    )
                })
                .collect();
            network.insert(format!("node{}", node.id), Value::Object(edges));
        }
        Value::Object(network)
    }
}

fn agent_json(agent: &AgentRecord) -> Value {
    json!({
        "source": agent.source,
        "destination": agent.destination,
        "route": agent.route,
        "route_width": agent.route_width,
        "route_bottleneck": agent.route_bottleneck,
        "state": agent.state,
    })
}

impl GenerationSink for JsonDocumentSink {
    fn network_snapshot(
        &mut self,
        _replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        let network = Self::network_json(snapshot);
        self.generations
            .entry(generation)
            .or_default()
            .insert("network".to_string(), network);
        Ok(())
    }

    fn generation_result(
        &mut self,
        _replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        let entry = self.generations.entry(record.generation).or_default();
        for agent in &record.agents {
            entry.insert(agent.kind.as_str().to_string(), agent_json(agent));
        }
        Ok(())
    }

    fn finish(&mut self, replicate: ReplicateId) -> Result<(), SinkError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut out = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut out, &self.document(replicate))?;
        out.flush()?;
        debug!("wrote {}", self.path.display());
        Ok(())
    }
}

// ============================================================================
// CSV
// ============================================================================

pub const CSV_HEADER: &str = "replicate,generation,record_type,node,neighbor,width,pheromone,agent,source,destination,route,route_width,route_bottleneck,state";

/// Flat rows: one `connection` row per directed adjacency entry of each
/// snapshot, one `agent` row per agent result. List columns are
/// space-separated.
pub struct CsvSink<W: Write> {
    out: W,
    rows: usize,
}

impl CsvSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        Self::new(BufWriter::new(File::create(path)?))
    }

    /// `dir/simulation<replicate>.csv`
    pub fn in_dir(dir: &Path, replicate: ReplicateId) -> Result<Self, SinkError> {
        Self::create(dir.join(format!("simulation{}.csv", replicate)))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(mut out: W) -> Result<Self, SinkError> {
        writeln!(out, "{}", CSV_HEADER)?;
        Ok(Self { out, rows: 0 })
    }

    /// Data rows written so far (header excluded)
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

impl<W: Write> GenerationSink for CsvSink<W> {
    fn network_snapshot(
        &mut self,
        replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        for node in &snapshot.nodes {
            for edge in &node.edges {
                writeln!(
                    self.out,
                    "{},{},connection,{},{},{},{},,,,,,,",
                    replicate, generation, node.id, edge.neighbor, edge.width, edge.pheromone
                )?;
                self.rows += 1;
            }
        }
        Ok(())
    }

    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        for agent in &record.agents {
            writeln!(
                self.out,
                "{},{},agent,,,,,{},{},{},{},{},{},{}",
                replicate,
                record.generation,
                agent.kind.as_str(),
                agent.source,
                agent.destination,
                join(&agent.route),
                join(&agent.route_width),
                agent.route_bottleneck,
                agent.state.as_str()
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self, _replicate: ReplicateId) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Forwards to every inner sink in order; the first error stops the fan-out.
///
/// `topology_built` also runs in order, so a sink that writes node ids back
/// must be added before any sink that reads ids in its own `topology_built`
/// (such as `CollectorSink::optimal_routes`). Snapshots and records are
/// always emitted after every sink has seen the topology.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn GenerationSink + Send>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink<S: GenerationSink + Send + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn with<S: GenerationSink + Send + 'static>(mut self, sink: S) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl GenerationSink for MultiSink {
    fn topology_built(
        &mut self,
        replicate: ReplicateId,
        network: &mut Network,
    ) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.topology_built(replicate, network)?;
        }
        Ok(())
    }

    fn wants_snapshots(&self) -> bool {
        self.sinks.iter().any(|s| s.wants_snapshots())
    }

    fn network_snapshot(
        &mut self,
        replicate: ReplicateId,
        generation: GenerationId,
        snapshot: &NetworkSnapshot,
    ) -> Result<(), SinkError> {
        for sink in self.sinks.iter_mut().filter(|s| s.wants_snapshots()) {
            sink.network_snapshot(replicate, generation, snapshot)?;
        }
        Ok(())
    }

    fn generation_result(
        &mut self,
        replicate: ReplicateId,
        record: &GenerationRecord,
    ) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.generation_result(replicate, record)?;
        }
        Ok(())
    }

    fn finish(&mut self, replicate: ReplicateId) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.finish(replicate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aco_interface::{AgentState, EdgeSnapshot, NodeSnapshot, DEFAULT_ATTACHMENT_EDGES};
    use crate::aco_params::FloorPolicy;

    fn params() -> Params {
        Params {
            num_nodes: 3,
            optimal_route_length: 1,
            volatility: 0.99,
            pheromone_min: 100,
            pheromone_max: 1 << 20,
            ttl: 100,
            bata: 1.0,
            generation_limit: 1,
            simulation_count: 1,
            attachment_edges: DEFAULT_ATTACHMENT_EDGES,
            floor_policy: FloorPolicy::Fixed,
        }
    }

    fn snapshot() -> NetworkSnapshot {
        NetworkSnapshot {
            optimal_route: vec![0, 1],
            nodes: vec![
                NodeSnapshot {
                    id: 0,
                    edges: vec![EdgeSnapshot {
                        neighbor: 1,
                        width: 100,
                        pheromone: 120,
                    }],
                },
                NodeSnapshot {
                    id: 1,
                    edges: vec![EdgeSnapshot {
                        neighbor: 0,
                        width: 100,
                        pheromone: 120,
                    }],
                },
            ],
        }
    }

    fn record(generation: GenerationId) -> GenerationRecord {
        let agent = |kind, state| AgentRecord {
            kind,
            source: 0,
            destination: 1,
            route: vec![0, 1],
            route_width: vec![100],
            route_bottleneck: 100,
            state,
        };
        GenerationRecord {
            generation,
            reinforced: true,
            agents: vec![
                agent(AgentKind::Ant, AgentState::Arrived),
                agent(AgentKind::Rand, AgentState::Arrived),
                agent(AgentKind::Interest, AgentState::Stuck),
            ],
        }
    }

    struct Failing;

    impl GenerationSink for Failing {
        fn network_snapshot(
            &mut self,
            _replicate: ReplicateId,
            _generation: GenerationId,
            _snapshot: &NetworkSnapshot,
        ) -> Result<(), SinkError> {
            Ok(())
        }

        fn generation_result(
            &mut self,
            _replicate: ReplicateId,
            _record: &GenerationRecord,
        ) -> Result<(), SinkError> {
            Err(SinkError::Rejected("full".to_string()))
        }
    }

    #[test]
    fn test_collector_keeps_records_in_order() {
        let mut sink = CollectorSink::new();
        sink.network_snapshot(0, 0, &snapshot()).unwrap();
        sink.generation_result(0, &record(0)).unwrap();
        sink.generation_result(0, &record(1)).unwrap();
        sink.finish(0).unwrap();

        assert_eq!(sink.snapshots.len(), 1);
        assert_eq!(sink.records.len(), 2);
        let interest: Vec<_> = sink.agent_records(AgentKind::Interest).collect();
        assert_eq!(interest.len(), 2);
        assert_eq!(interest[0].state, AgentState::Stuck);
        assert_eq!(sink.finished, vec![0]);
        assert!(!CollectorSink::without_snapshots().wants_snapshots());
    }

    #[test]
    fn test_json_document_shape() {
        let mut sink = JsonDocumentSink::new("unused.json", &params()).unwrap();
        sink.network_snapshot(2, 0, &snapshot()).unwrap();
        sink.generation_result(2, &record(0)).unwrap();

        let doc = sink.document(2);
        assert_eq!(doc["params"]["num_nodes"], 3);
        let generation = &doc["simulation2"]["generation0"];
        assert_eq!(generation["network"]["optimal"], json!([0, 1]));
        assert_eq!(generation["network"]["node0"]["node1"]["width"], 100);
        assert_eq!(generation["network"]["node1"]["node0"]["pheromone"], 120);
        assert_eq!(generation["ant"]["route"], json!([0, 1]));
        assert_eq!(generation["ant"]["route_bottleneck"], 100);
        assert_eq!(generation["interest"]["state"], "stuck");
        assert!(generation.get("rand").is_some());
    }

    #[test]
    fn test_json_document_written_on_finish() {
        let dir = std::env::temp_dir().join(format!("aco_json_sink_{}", std::process::id()));
        let mut sink = JsonDocumentSink::in_dir(&dir, 0, &params()).unwrap();
        sink.network_snapshot(0, 0, &snapshot()).unwrap();
        sink.generation_result(0, &record(0)).unwrap();
        sink.finish(0).unwrap();

        let text = fs::read_to_string(sink.path()).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["simulation0"]["generation0"]["rand"]["source"], 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_csv_rows() {
        let mut sink = CsvSink::new(Vec::new()).unwrap();
        sink.network_snapshot(1, 0, &snapshot()).unwrap();
        sink.generation_result(1, &record(0)).unwrap();
        sink.finish(1).unwrap();
        assert_eq!(sink.rows(), 5);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,0,connection,0,1,100,120,,,,,,,");
        assert_eq!(lines[3], "1,0,agent,,,,,ant,0,1,0 1,100,100,arrived");
        assert_eq!(lines[5], "1,0,agent,,,,,interest,0,1,0 1,100,100,stuck");

        let columns = CSV_HEADER.split(',').count();
        for line in &lines {
            assert_eq!(line.split(',').count(), columns, "bad row: {}", line);
        }
    }

    #[test]
    fn test_multi_sink_forwards_and_filters_snapshots() {
        let mut multi = MultiSink::new();
        multi.add_sink(LoggingSink);
        assert!(!multi.wants_snapshots());

        let mut multi = multi.with(CollectorSink::new());
        assert_eq!(multi.len(), 2);
        assert!(multi.wants_snapshots());
        multi.network_snapshot(0, 0, &snapshot()).unwrap();
        multi.generation_result(0, &record(0)).unwrap();
        multi.finish(0).unwrap();
    }

    #[test]
    fn test_multi_sink_surfaces_first_error() {
        let mut multi = MultiSink::new().with(CollectorSink::new()).with(Failing);
        assert!(matches!(
            multi.generation_result(0, &record(0)),
            Err(SinkError::Rejected(_))
        ));
    }
}
