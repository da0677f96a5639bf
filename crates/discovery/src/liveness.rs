//! Phase A: bounded reachability probes.

use std::future::Future;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::trace;

use holofleet_protocol::constants::{DEFAULT_PORT, LIVENESS_TIMEOUT};

/// A single reachability check against one address.
///
/// Implementations must bound their own duration; the scanner applies no
/// outer timeout.
pub trait LivenessProbe: Send + Sync {
    fn is_alive(&self, ip: Ipv4Addr) -> impl Future<Output = bool> + Send;
}

/// Runs the system `ping` utility once per host.
#[derive(Debug, Clone)]
pub struct PingProbe {
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(LIVENESS_TIMEOUT)
    }
}

impl LivenessProbe for PingProbe {
    async fn is_alive(&self, ip: Ipv4Addr) -> bool {
        let mut cmd = tokio::process::Command::new("ping");

        #[cfg(target_os = "windows")]
        cmd.args(["-n", "1", "-w", &self.timeout.as_millis().to_string()]);

        #[cfg(not(target_os = "windows"))]
        cmd.args(["-c", "1", "-W", &self.timeout.as_secs().max(1).to_string()]);

        cmd.arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let alive = matches!(
            tokio::time::timeout(self.timeout, cmd.status()).await,
            Ok(Ok(status)) if status.success()
        );
        trace!(%ip, alive, "ping probe");
        alive
    }
}

/// Opens a TCP connection to the unit port.
///
/// A refused connection still proves the host is up.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, LIVENESS_TIMEOUT)
    }
}

impl LivenessProbe for TcpProbe {
    async fn is_alive(&self, ip: Ipv4Addr) -> bool {
        let alive = match tokio::time::timeout(self.timeout, TcpStream::connect((ip, self.port)))
            .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => e.kind() == ErrorKind::ConnectionRefused,
            Err(_) => false,
        };
        trace!(%ip, port = self.port, alive, "tcp probe");
        alive
    }
}

/// Liveness method chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum Liveness {
    Ping(PingProbe),
    Tcp(TcpProbe),
}

impl LivenessProbe for Liveness {
    async fn is_alive(&self, ip: Ipv4Addr) -> bool {
        match self {
            Liveness::Ping(p) => p.is_alive(ip).await,
            Liveness::Tcp(p) => p.is_alive(ip).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new(port, Duration::from_secs(1));
        assert!(probe.is_alive(Ipv4Addr::LOCALHOST).await);
    }

    #[tokio::test]
    async fn tcp_probe_counts_refused_as_alive() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpProbe::new(port, Duration::from_secs(1));
        assert!(probe.is_alive(Ipv4Addr::LOCALHOST).await);
    }

    #[tokio::test]
    async fn liveness_dispatches_to_inner_probe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let liveness = Liveness::Tcp(TcpProbe::new(port, Duration::from_secs(1)));
        assert!(liveness.is_alive(Ipv4Addr::LOCALHOST).await);
    }
}
