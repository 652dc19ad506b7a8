mod common;

use std::fs::File;
use std::io::Write;
use std::rc::Rc;

use common::*;
use uav_router::config::RouterConfig;
use uav_router::routing::{Destination, EndpointStore, Router};
use uav_router::sink::{downgrade, Collector, Sink, WriterSink};

fn fixture_router() -> (RouterConfig, Router) {
    let cfg = RouterConfig::load(&fixture_path("router.yaml")).unwrap();
    let router = Router::new(cfg.routes.clone());
    (cfg, router)
}

fn attach(router: &Router, names: &[&str]) -> Vec<Rc<Collector>> {
    names
        .iter()
        .map(|name| {
            let sink = Rc::new(Collector::new());
            router.register_write_end(name, downgrade(&sink));
            sink
        })
        .collect()
}

#[test]
fn fixture_config() {
    let (cfg, router) = fixture_router();
    // "broken" has a filter node without outputs
    assert_eq!(cfg.routes.len(), 5);
    assert_eq!(router.routes().len(), 5);
    assert_eq!(
        cfg.logging.directives(),
        vec!["warn", "uav_router::routing=debug"]
    );
    assert_eq!(cfg.stats.as_ref().unwrap().endpoint, "log-stats");
    let files = cfg.file_endpoints();
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|(name, f)| name == "log-stats" && f.append));

    for name in ["gcs", "/^log.*$/", "gps", "junk", "uart0", "log-raw"] {
        assert!(router.store().contains(name), "{name} not registered");
    }
}

#[test]
fn autopilot_stream_is_split() {
    let (_, mut router) = fixture_router();
    let sinks = attach(&router, &["gcs", "log-a", "gps", "junk"]);
    let [gcs, log, gps, junk] = [&sinks[0], &sinks[1], &sinks[2], &sinks[3]];

    let mut input = b"boot\r\n".to_vec();
    input.extend(heartbeat());
    input.extend_from_slice(GPGLL.as_bytes());
    input.extend(mavlink_frame(1, 30, &[7; 28]));
    let uart0 = router.add_source("uart0");
    write_chunked(&*uart0, &input, 9, 42);

    let frames = vec![heartbeat(), mavlink_frame(1, 30, &[7; 28])];
    assert_eq!(gcs.writes(), frames);
    assert_eq!(log.writes(), frames);
    assert_eq!(gps.writes(), vec![GPGLL.as_bytes().to_vec()]);
    assert_eq!(junk.bytes(), b"boot\r\n".to_vec());

    let stats = router.stats();
    let names: Vec<&str> = stats.iter().map(|(_, s)| s.filter.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"mavlink1") && names.contains(&"nmea"));
    assert!(stats.iter().all(|(entry, _)| entry == "uart0"));
}

#[test]
fn corrections_reach_the_autopilot() {
    let (_, mut router) = fixture_router();
    let sinks = attach(&router, &["uart0", "log-raw"]);
    let (uart0, raw) = (&sinks[0], &sinks[1]);

    let frame = rtcm_frame(&[0x11; 40]);
    let mut input = b"ICY 200 OK\r\n".to_vec();
    input.extend_from_slice(&frame);

    router.add_source("ntrip-caster").write(&input);
    assert_eq!(uart0.writes(), vec![frame.clone()]);
    assert_eq!(raw.count(), 0);

    // base also has a raw copy; its unknown filter branch is skipped
    router.add_source("base").write(&input);
    assert_eq!(uart0.writes(), vec![frame.clone(), frame]);
    assert_eq!(raw.bytes(), input);
}

#[test]
fn server_clients() {
    let (_, mut router) = fixture_router();
    let sinks = attach(&router, &["uart0"]);
    let uart0 = &sinks[0];
    router.add_source("tcpsvr");

    let one = Rc::new(Collector::new());
    let two = Rc::new(Collector::new());
    let from_one = router.connect_client("tcpsvr", "tcpsvr:10.0.0.1:5760", Some(one.clone()));
    let from_two = router.connect_client("tcpsvr", "tcpsvr:10.0.0.2:5760", Some(two.clone()));

    from_one.write(b"arm");
    from_two.write(b"disarm");
    assert_eq!(uart0.writes(), vec![b"arm".to_vec(), b"disarm".to_vec()]);

    assert!(router.disconnect_client("tcpsvr:10.0.0.1:5760"));
    assert!(!router.disconnect_client("tcpsvr:10.0.0.1:5760"));
    assert!(router.client("tcpsvr:10.0.0.2:5760").is_some());
}

#[test]
fn file_endpoint_receives_frames() {
    let dir = tempfile::tempdir().unwrap();
    let (cfg, mut router) = fixture_router();

    let mut outputs = Vec::new();
    for (name, file) in cfg.file_endpoints() {
        let f = File::create(dir.path().join(&file.path)).unwrap();
        let sink = Rc::new(WriterSink::new(&name, f));
        router.register_write_end(&name, downgrade(&sink));
        outputs.push(sink);
    }

    let input = rtcm_frame(&[1, 2, 3]);
    router.add_source("base").write(&input);
    for sink in &outputs {
        sink.flush().unwrap();
    }
    assert_eq!(std::fs::read(dir.path().join("raw.bin")).unwrap(), input);
    assert!(std::fs::read(dir.path().join("stats.json")).unwrap().is_empty());
}

#[test]
fn config_from_temp_file_with_env() {
    std::env::set_var("UAV_ROUTER_TEST_DST", "radio");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "routes:\n  r: {{ src: uart0, dst: \"${{UAV_ROUTER_TEST_DST}}\" }}"
    )
    .unwrap();

    let cfg = RouterConfig::load(file.path()).unwrap();
    let mut router = Router::new(cfg.routes);
    let radio = attach(&router, &["radio"]).remove(0);
    router.add_source("uart0").write(b"x");
    assert_eq!(radio.bytes(), b"x".to_vec());
}

#[test]
fn destination_fan_out_order() {
    let dst = Destination::new();
    let a = Rc::new(Collector::new());
    let b = Rc::new(Collector::new());
    dst.add_sink(&a);
    dst.add_sink(&b);

    for chunk in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        assert_eq!(dst.write(chunk), chunk.len());
    }
    drop(b);
    assert_eq!(dst.write(b"four"), 4);
    assert_eq!(
        a.writes(),
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec(), b"four".to_vec()]
    );
}

#[test]
fn pattern_endpoint_collects_sources() {
    let mut store = EndpointStore::new();
    let pattern = store.register_name("/^gps.*$/").unwrap();
    let sink = Rc::new(Collector::new());
    store.register_write_end("gps1", downgrade(&sink));
    assert_eq!(pattern.len(), 1);

    let dest = Destination::new();
    store.connect_to_dest("gps1", &dest);
    dest.write(b"$");
    assert_eq!(sink.bytes(), b"$".to_vec());
}

#[test]
fn numeric_endpoint_names() {
    let cfg = RouterConfig::from_yaml(
        "routes:\n  r: { src: uart0, dst: [gcs, 14550] }\n  s: { src: 5760, dst: gcs }\n",
    )
    .unwrap();
    assert_eq!(cfg.routes.len(), 2);

    let mut router = Router::new(cfg.routes);
    let sinks = attach(&router, &["14550", "gcs"]);
    router.add_source("uart0").write(b"x");
    router.add_source("5760").write(b"y");
    assert_eq!(sinks[0].bytes(), b"x".to_vec());
    assert_eq!(sinks[1].bytes(), b"xy".to_vec());
}
