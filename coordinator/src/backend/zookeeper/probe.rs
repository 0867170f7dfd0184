//! Zookeeper server probes based on the "four letter word" admin commands.
//!
//! These talk to a single server over a plain TCP connection and do not need a session.
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::Shutdown;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use failure::ResultExt;
use serde::Deserialize;
use serde::Serialize;

use super::super::super::ErrorKind;
use super::super::super::Result;

const NOT_IN_WHITELIST: &str = "is not executed because it is not in the whitelist";
const VERSION_PREFIX: &str = "Zookeeper version:";

/// Server information reported by the `stat` command.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct ServerStats {
    /// Connected clients, as reported by the server.
    pub clients: Vec<String>,
    pub connections: Option<u64>,
    /// Request latency in milliseconds; newer servers report a fractional average.
    pub latency_avg: Option<f64>,
    pub latency_max: Option<u64>,
    pub latency_min: Option<u64>,
    /// Server role in the ensemble (`standalone`, `leader`, `follower`, ...).
    pub mode: Option<String>,
    pub node_count: Option<u64>,
    pub outstanding: Option<u64>,
    pub received: Option<u64>,
    pub sent: Option<u64>,
    pub version: String,
    pub zxid: Option<String>,
}

impl ServerStats {
    /// Parse the output of the `stat` command.
    pub fn parse(lines: &[String]) -> Result<ServerStats> {
        if let Some(line) = lines.first() {
            if line.contains(NOT_IN_WHITELIST) {
                return Err(ErrorKind::CommandNotAllowed("stat".into()).into());
            }
        }

        let mut stats = ServerStats::default();
        let mut version = None;
        let mut in_clients = false;
        for line in lines {
            if in_clients {
                if line.trim().is_empty() {
                    in_clients = false;
                } else {
                    stats.clients.push(line.trim().to_string());
                }
                continue;
            }
            if line.starts_with(VERSION_PREFIX) {
                version = Some(line[VERSION_PREFIX.len()..].trim().to_string());
                continue;
            }
            if line.trim() == "Clients:" {
                in_clients = true;
                continue;
            }
            let (key, value) = match line.find(':') {
                None => continue,
                Some(index) => (line[..index].trim(), line[index + 1..].trim()),
            };
            match key {
                "Connections" => stats.connections = Some(parse_number("connections", value)?),
                "Latency min/avg/max" => {
                    let (min, avg, max) = parse_latency(value)?;
                    stats.latency_min = Some(min);
                    stats.latency_avg = Some(avg);
                    stats.latency_max = Some(max);
                }
                "Mode" => stats.mode = Some(value.to_string()),
                "Node count" => stats.node_count = Some(parse_number("node count", value)?),
                "Outstanding" => stats.outstanding = Some(parse_number("outstanding", value)?),
                "Received" => stats.received = Some(parse_number("received", value)?),
                "Sent" => stats.sent = Some(parse_number("sent", value)?),
                "Zxid" => stats.zxid = Some(value.to_string()),
                _ => (),
            };
        }
        stats.version = version.ok_or(ErrorKind::ProbeParse("server version"))?;
        Ok(stats)
    }
}

fn parse_number(what: &'static str, value: &str) -> Result<u64> {
    let number = value.parse::<u64>().with_context(|_| ErrorKind::ProbeParse(what))?;
    Ok(number)
}

/// Split a `min/avg/max` latency triple.
fn parse_latency(value: &str) -> Result<(u64, f64, u64)> {
    let parts: Vec<&str> = value.split('/').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ErrorKind::ProbeParse("latency").into());
    }
    let min = parse_number("latency", parts[0])?;
    let avg = parts[1]
        .parse::<f64>()
        .with_context(|_| ErrorKind::ProbeParse("latency"))?;
    let max = parse_number("latency", parts[2])?;
    Ok((min, avg, max))
}

/// Resolve `address` to every socket address it points to.
fn resolve(address: &str) -> Result<Vec<SocketAddr>> {
    let addresses: Vec<SocketAddr> = address
        .to_socket_addrs()
        .with_context(|_| ErrorKind::Probe(address.to_string()))?
        .collect();
    if addresses.is_empty() {
        return Err(ErrorKind::Probe(address.to_string()).into());
    }
    Ok(addresses)
}

/// Connect to the first of `targets` that accepts a connection.
fn connect_any(address: &str, targets: &[SocketAddr], timeout: Duration) -> Result<TcpStream> {
    let mut last_error = None;
    for target in targets {
        match TcpStream::connect_timeout(target, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        };
    }
    let error = match last_error {
        None => return Err(ErrorKind::Probe(address.to_string()).into()),
        Some(error) => error,
    };
    Err(error)
        .with_context(|_| ErrorKind::Probe(address.to_string()))
        .map_err(Into::into)
}

/// Send a four letter word command and return the lines of the reply.
///
/// The server closes the connection once the reply is sent.
pub fn four_letter_word(address: &str, command: &str, timeout: Duration) -> Result<Vec<String>> {
    let targets = resolve(address)?;
    let stream = connect_any(address, &targets, timeout)?;
    stream
        .set_read_timeout(Some(timeout))
        .with_context(|_| ErrorKind::Probe(address.to_string()))?;
    stream
        .set_write_timeout(Some(timeout))
        .with_context(|_| ErrorKind::Probe(address.to_string()))?;
    (&stream)
        .write_all(command.as_bytes())
        .with_context(|_| ErrorKind::Probe(address.to_string()))?;
    // Some servers only reply once the request side is closed.
    let _ = stream.shutdown(Shutdown::Write);

    let mut lines = Vec::new();
    for line in BufReader::new(&stream).lines() {
        let line = line.with_context(|_| ErrorKind::Probe(address.to_string()))?;
        lines.push(line);
    }
    Ok(lines)
}

/// Check the server is running and not in an error state.
pub fn ruok(address: &str, timeout: Duration) -> Result<bool> {
    let lines = four_letter_word(address, "ruok", timeout)?;
    if let Some(line) = lines.first() {
        if line.contains(NOT_IN_WHITELIST) {
            return Err(ErrorKind::CommandNotAllowed("ruok".into()).into());
        }
    }
    Ok(lines.first().map(|line| line.trim() == "imok").unwrap_or(false))
}

/// Fetch and parse the `stat` output of a server.
pub fn stat(address: &str, timeout: Duration) -> Result<ServerStats> {
    let lines = four_letter_word(address, "stat", timeout)?;
    ServerStats::parse(&lines)
}

/// Poll a server with `stat` until it answers or `deadline` elapses.
///
/// A server that refuses `stat` because of its whitelist is answering and counts as up.
pub fn wait_for_server(address: &str, deadline: Duration, poll: Duration) -> Result<bool> {
    let start = Instant::now();
    loop {
        let remaining = match deadline.checked_sub(start.elapsed()) {
            Some(remaining) if remaining > Duration::from_millis(0) => remaining,
            _ => return Ok(false),
        };
        match four_letter_word(address, "stat", remaining) {
            Ok(lines) => {
                let up = lines
                    .first()
                    .map(|line| line.starts_with(VERSION_PREFIX) || line.contains(NOT_IN_WHITELIST))
                    .unwrap_or(false);
                if up {
                    return Ok(true);
                }
            }
            Err(error) => match error.kind() {
                ErrorKind::Probe(_) => (),
                _ => return Err(error),
            },
        };
        if start.elapsed() + poll >= deadline {
            return Ok(false);
        }
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use std::thread::JoinHandle;
    use std::time::Duration;

    use super::super::super::super::ErrorKind;
    use super::connect_any;
    use super::four_letter_word;
    use super::ruok;
    use super::stat;
    use super::wait_for_server;
    use super::ServerStats;

    const STAT_REPLY: &str = "Zookeeper version: 3.4.14-4c25d480e66aadd371de8bd2fd8da255ac140bcf, built on 03/06/2019 16:18 GMT
Clients:
 /127.0.0.1:53422[1](queued=0,recved=12,sent=12)
 /127.0.0.1:53424[0](queued=0,recved=1,sent=0)

Latency min/avg/max: 0/1/14
Received: 13
Sent: 12
Connections: 2
Outstanding: 0
Zxid: 0x1d
Mode: standalone
Node count: 11
";

    /// Serve `replies.len()` connections, answering each with the next reply.
    fn fake_server(replies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let mut commands = Vec::new();
            for reply in replies {
                let (mut stream, _) = listener.accept().unwrap();
                let mut command = [0; 4];
                stream.read_exact(&mut command).unwrap();
                commands.push(String::from_utf8_lossy(&command).to_string());
                stream.write_all(reply.as_bytes()).unwrap();
            }
            commands
        });
        (address, handle)
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(String::from).collect()
    }

    #[test]
    fn parse_stat() {
        let stats = ServerStats::parse(&lines(STAT_REPLY)).unwrap();
        assert_eq!(
            stats.version,
            "3.4.14-4c25d480e66aadd371de8bd2fd8da255ac140bcf, built on 03/06/2019 16:18 GMT"
        );
        assert_eq!(stats.clients.len(), 2);
        assert_eq!(stats.connections, Some(2));
        assert_eq!(stats.latency_min, Some(0));
        assert_eq!(stats.latency_avg, Some(1.0));
        assert_eq!(stats.latency_max, Some(14));
        assert_eq!(stats.mode, Some("standalone".into()));
        assert_eq!(stats.node_count, Some(11));
        assert_eq!(stats.outstanding, Some(0));
        assert_eq!(stats.received, Some(13));
        assert_eq!(stats.sent, Some(12));
        assert_eq!(stats.zxid, Some("0x1d".into()));
    }

    #[test]
    fn parse_fractional_latency() {
        let reply = lines("Zookeeper version: 3.6.3\nLatency min/avg/max: 0/0.4876/9\n");
        let stats = ServerStats::parse(&reply).unwrap();
        assert_eq!(stats.latency_min, Some(0));
        assert_eq!(stats.latency_avg, Some(0.4876));
        assert_eq!(stats.latency_max, Some(9));
    }

    #[test]
    fn parse_bad_latency() {
        let reply = lines("Zookeeper version: 3.6.3\nLatency min/avg/max: 0/1\n");
        let error = ServerStats::parse(&reply).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::ProbeParse("latency"));
    }

    #[test]
    fn parse_stat_not_allowed() {
        let reply = lines("stat is not executed because it is not in the whitelist.");
        let error = ServerStats::parse(&reply).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::CommandNotAllowed("stat".into()));
    }

    #[test]
    fn parse_stat_without_version() {
        let error = ServerStats::parse(&lines("Mode: leader\n")).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::ProbeParse("server version"));
    }

    #[test]
    fn parse_stat_bad_number() {
        let reply = lines("Zookeeper version: 3.5.5\nNode count: many\n");
        let error = ServerStats::parse(&reply).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::ProbeParse("node count"));
    }

    #[test]
    fn send_command() {
        let (address, server) = fake_server(vec!["line one\nline two\n"]);
        let reply = four_letter_word(&address, "envi", Duration::from_secs(5)).unwrap();
        assert_eq!(reply, vec!["line one", "line two"]);
        assert_eq!(server.join().unwrap(), vec!["envi"]);
    }

    #[test]
    fn stat_over_tcp() {
        let (address, server) = fake_server(vec![STAT_REPLY]);
        let stats = stat(&address, Duration::from_secs(5)).unwrap();
        assert_eq!(stats.mode, Some("standalone".into()));
        assert_eq!(server.join().unwrap(), vec!["stat"]);
    }

    #[test]
    fn ruok_imok() {
        let (address, server) = fake_server(vec!["imok", "nope"]);
        assert!(ruok(&address, Duration::from_secs(5)).unwrap());
        assert!(!ruok(&address, Duration::from_secs(5)).unwrap());
        assert_eq!(server.join().unwrap(), vec!["ruok", "ruok"]);
    }

    #[test]
    fn probe_unreachable_server() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let error = stat(&address, Duration::from_millis(200)).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Probe(address));
    }

    #[test]
    fn connect_skips_unreachable_addresses() {
        let closed = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open = listener.local_addr().unwrap();
        let stream = connect_any("test", &[closed, open], Duration::from_secs(5)).unwrap();
        assert_eq!(stream.peer_addr().unwrap(), open);

        let error = connect_any("test", &[closed], Duration::from_millis(200)).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::Probe("test".into()));
    }

    #[test]
    fn wait_for_server_up() {
        let (address, server) = fake_server(vec!["", STAT_REPLY]);
        let up = wait_for_server(&address, Duration::from_secs(5), Duration::from_millis(10));
        assert!(up.unwrap());
        assert_eq!(server.join().unwrap(), vec!["stat", "stat"]);
    }

    #[test]
    fn wait_for_server_times_out() {
        let address = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let up = wait_for_server(&address, Duration::from_millis(200), Duration::from_millis(50));
        assert!(!up.unwrap());
    }
}
