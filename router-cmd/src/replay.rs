use std::fs::File;
use std::io::{stdout, BufWriter, Read, Stdout};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};
use uav_router::config::{FileEndpoint, RouterConfig};
use uav_router::routing::{Destination, Router};
use uav_router::sink::{downgrade, Sink, WriterSink};
use uav_router::stats::StatsSnapshot;

#[derive(Debug, Clone, Serialize)]
struct EntryStats<'a> {
    entry: &'a str,
    #[serde(flatten)]
    stats: &'a StatsSnapshot,
}

fn open_file(file: &FileEndpoint) -> Result<File> {
    File::options()
        .create(true)
        .write(true)
        .append(file.append)
        .truncate(!file.append)
        .open(&file.path)
        .with_context(|| format!("failed to open {:?}", file.path))
}

/// Every output the replay writes to, by endpoint name, kept alive for the run.
#[derive(Default)]
struct Outputs {
    files: Vec<(String, Rc<WriterSink<BufWriter<File>>>)>,
    printed: Vec<(String, Rc<WriterSink<Stdout>>)>,
}

impl Outputs {
    fn attach(router: &Router, cfg: &RouterConfig, print: &[String]) -> Result<Self> {
        let mut outputs = Outputs::default();
        for (name, file) in cfg.file_endpoints() {
            let sink = Rc::new(WriterSink::new(&name, BufWriter::new(open_file(&file)?)));
            let joined = router.register_write_end(&name, downgrade(&sink));
            debug!(endpoint = %name, path = ?file.path, joined, "file output");
            outputs.files.push((name, sink));
        }
        for name in print {
            let sink = Rc::new(WriterSink::new(name, stdout()));
            if router.register_write_end(name, downgrade(&sink)) == 0 {
                warn!(endpoint = %name, "no route writes to this endpoint");
            }
            outputs.printed.push((name.clone(), sink));
        }
        Ok(outputs)
    }

    /// Write to every output named `name`, returning how many there were.
    fn write(&self, name: &str, buf: &[u8]) -> usize {
        let files = self.files.iter().map(|(n, s)| (n, s.as_ref() as &dyn Sink));
        let printed = self.printed.iter().map(|(n, s)| (n, s.as_ref() as &dyn Sink));
        let mut count = 0;
        for (_, sink) in files.chain(printed).filter(|(n, _)| n.as_str() == name) {
            sink.write(buf);
            count += 1;
        }
        count
    }

    fn flush(&self) -> Result<()> {
        for (name, sink) in &self.files {
            sink.flush().with_context(|| format!("failed to flush output {name}"))?;
        }
        for (_, sink) in &self.printed {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Write `input` to `dest` in writes of at most `chunk` bytes, returning the bytes read.
fn feed<R: Read>(mut input: R, dest: &Destination, chunk: usize) -> Result<usize> {
    let mut buf = vec![0u8; chunk];
    let mut total = 0;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        dest.write(&buf[..n]);
        total += n;
    }
}

fn stats_json(router: &Router) -> Result<String> {
    let stats = router.stats();
    let entries: Vec<EntryStats> = stats
        .iter()
        .map(|(entry, stats)| EntryStats { entry, stats })
        .collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

pub fn replay(
    cfg: &RouterConfig,
    source: &str,
    chunk: usize,
    print: &[String],
    inputs: &[PathBuf],
) -> Result<()> {
    let mut router = Router::new(cfg.routes.clone());
    if !router.routes().iter().any(|r| r.source.matches(source)) {
        bail!("no route reads from {source}");
    }
    let outputs = Outputs::attach(&router, cfg, print)?;
    let root = router.add_source(source);

    for path in inputs {
        let total = replay_file(path, &root, chunk)?;
        info!(source, input = ?path, bytes = total, "replayed");
    }

    let json = stats_json(&router)?;
    if let Some(stats) = &cfg.stats {
        if outputs.write(&stats.endpoint, format!("{json}\n").as_bytes()) == 0 {
            warn!(endpoint = %stats.endpoint, "stats endpoint has no output");
        }
    }
    outputs.flush()?;
    println!("{json}");
    Ok(())
}

fn replay_file(path: &Path, root: &Destination, chunk: usize) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("failed to open input {path:?}"))?;
    feed(file, root, chunk).with_context(|| format!("failed to read input {path:?}"))
}
