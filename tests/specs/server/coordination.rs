//! Coordination server conversations over raw TCP lines.

use crate::prelude::*;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};

/// A running pabotd bound to an ephemeral port.
struct Daemon {
    child: Child,
    addr: String,
    _dir: tempfile::TempDir,
}

impl Daemon {
    fn start(resource: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cmd = Command::new(binary_path("pabotd"));
        cmd.current_dir(dir.path())
            .args(["--port", "0"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(text) = resource {
            std::fs::write(dir.path().join("valueset.dat"), text).expect("resource file");
            cmd.args(["--resourcefile", "valueset.dat"]);
        }

        let mut child = cmd.spawn().expect("pabotd starts");
        let stdout = child.stdout.take().expect("piped stdout");
        let mut line = String::new();
        BufReader::new(stdout)
            .read_line(&mut line)
            .expect("startup line");
        // "pabotd listening on tcp://127.0.0.1:PORT"
        let addr = line
            .trim()
            .rsplit_once("tcp://")
            .expect("startup line carries the address")
            .1
            .to_string();

        Self {
            child,
            addr,
            _dir: dir,
        }
    }

    fn client(&self) -> Client {
        Client::connect(&self.addr)
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(addr: &str) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        let reader = BufReader::new(stream.try_clone().expect("clone stream"));
        Self {
            reader,
            writer: stream,
        }
    }

    fn call(&mut self, request: Value) -> Value {
        let mut line = request.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).expect("write request");
        let mut response = String::new();
        self.reader.read_line(&mut response).expect("read response");
        serde_json::from_str(&response).expect("JSON response")
    }
}

#[test]
fn lock_handoff_is_fifo_across_clients() {
    let daemon = Daemon::start(None);
    let mut a = daemon.client();
    let mut b = daemon.client();
    let mut c = daemon.client();

    assert_eq!(a.call(json!({"op":"acquire_lock","name":"db","caller":"a"}))["status"], "ok");
    assert_eq!(b.call(json!({"op":"acquire_lock","name":"db","caller":"b"}))["status"], "retry");
    assert_eq!(c.call(json!({"op":"acquire_lock","name":"db","caller":"c"}))["status"], "retry");

    assert_eq!(a.call(json!({"op":"release_lock","name":"db","caller":"a"}))["status"], "ok");
    // b enqueued first, so c keeps waiting while b is granted
    assert_eq!(c.call(json!({"op":"acquire_lock","name":"db","caller":"c"}))["status"], "retry");
    assert_eq!(b.call(json!({"op":"acquire_lock","name":"db","caller":"b"}))["status"], "ok");

    assert_eq!(b.call(json!({"op":"release_lock","name":"db","caller":"b"}))["status"], "ok");
    assert_eq!(c.call(json!({"op":"acquire_lock","name":"db","caller":"c"}))["status"], "ok");
}

#[test]
fn value_set_pool_distributes_and_exhausts() {
    let daemon = Daemon::start(Some(
        "[S1]\ntags = admin\nHOST = h1\n\n[S2]\ntags = admin\nHOST = h2\n",
    ));
    let mut a = daemon.client();
    let mut b = daemon.client();
    let mut c = daemon.client();

    let ra = a.call(json!({"op":"acquire_value_set","tag":"admin","caller":"a"}));
    let rb = b.call(json!({"op":"acquire_value_set","tag":"ADMIN","caller":"b"}));
    assert_eq!(ra["status"], "value");
    assert_eq!(rb["status"], "value");
    assert_ne!(ra["value"], rb["value"]);

    let rc = c.call(json!({"op":"acquire_value_set","tag":"admin","caller":"c"}));
    assert_eq!(rc["kind"], "no_value_set_available");

    // Case-insensitive key lookup inside the leased set
    let host = a.call(json!({"op":"get_value_from_set","key":"host","caller":"a"}));
    assert!(host["value"].as_str().unwrap().starts_with('h'));

    a.call(json!({"op":"release_value_set","caller":"a"}));
    let rc = c.call(json!({"op":"acquire_value_set","tag":"admin","caller":"c"}));
    assert_eq!(rc["status"], "value");
}

#[test]
fn run_only_once_blocks_until_first_reports_done() {
    let daemon = Daemon::start(None);
    let mut a = daemon.client();
    let mut b = daemon.client();

    assert_eq!(a.call(json!({"op":"run_only_once","id":"setup","caller":"a"}))["status"], "first");
    assert_eq!(b.call(json!({"op":"run_only_once","id":"setup","caller":"b"}))["status"], "retry");
    assert_eq!(a.call(json!({"op":"mark_run_done","id":"setup","caller":"a"}))["status"], "ok");
    assert_eq!(b.call(json!({"op":"run_only_once","id":"setup","caller":"b"}))["status"], "already");
}

#[test]
fn parallel_values_and_errors_over_the_wire() {
    let daemon = Daemon::start(None);
    let mut a = daemon.client();

    assert_eq!(a.call(json!({"op":"get_parallel_value","key":"k"}))["value"], "");
    a.call(json!({"op":"set_parallel_value","key":"k","value":"v"}));
    assert_eq!(a.call(json!({"op":"get_parallel_value","key":"k"}))["value"], "v");

    let err = a.call(json!({"op":"release_lock","name":"none","caller":"a"}));
    assert_eq!(err["status"], "error");
    assert_eq!(err["kind"], "release_without_acquire");

    let err = a.call(json!({"op":"acquire_value_set","tag":"ghost","caller":"a"}));
    assert_eq!(err["kind"], "no_such_tag");
}

#[test]
fn oversized_line_closes_the_connection() {
    let daemon = Daemon::start(None);
    let mut client = daemon.client();

    let huge = vec![b'x'; 70 * 1024];
    client.writer.write_all(&huge).expect("write junk");
    client.writer.write_all(b"\n").expect("terminate line");
    let _ = client.writer.shutdown(std::net::Shutdown::Write);

    // Server drops the connection instead of answering
    let mut rest = Vec::new();
    let n = client.reader.read_to_end(&mut rest).unwrap_or(0);
    assert_eq!(n, 0);
}
