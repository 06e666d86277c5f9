use anyhow::Context;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

const IP_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://icanhazip.com",
    "https://ident.me",
    "https://checkip.amazonaws.com",
    "https://ifconfig.me/ip",
];

/// TCP-level reachability of an ssh endpoint; a go/no-go gate before sync,
/// not an auth check.
pub fn ssh_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            debug!(host, error = %err, "ssh host did not resolve");
            return false;
        }
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, timeout).is_ok() {
            return true;
        }
    }
    false
}

/// Asks a list of plain-text IP services for the external address; first
/// valid answer wins.
pub fn external_ip() -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .ok()?;
    for service in IP_SERVICES {
        let Ok(response) = client.get(*service).send() else {
            continue;
        };
        if !response.status().is_success() {
            continue;
        }
        let Ok(body) = response.text() else {
            continue;
        };
        let ip = body.trim().to_string();
        if is_valid_ip(&ip) {
            return Some(ip);
        }
    }
    None
}

pub fn is_valid_ip(ip: &str) -> bool {
    ip.split(' ')
        .next()
        .map(|value| value.parse::<std::net::IpAddr>().is_ok())
        .unwrap_or(false)
}

/// Default GitHub ssh endpoint check.
pub fn github_ssh_reachable(timeout: Duration) -> anyhow::Result<bool> {
    let _ = ("github.com", 22u16)
        .to_socket_addrs()
        .context("resolve github.com")?;
    Ok(ssh_reachable("github.com", 22, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn valid_ips_are_accepted() {
        assert!(is_valid_ip("192.168.1.10"));
        assert!(is_valid_ip("2001:db8::1"));
        assert!(is_valid_ip("10.0.0.1 (local)"));
    }

    #[test]
    fn invalid_ips_are_rejected() {
        assert!(!is_valid_ip("not-an-ip"));
        assert!(!is_valid_ip(""));
        assert!(!is_valid_ip("999.999.999.999"));
    }

    #[test]
    fn local_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(ssh_reachable("127.0.0.1", port, Duration::from_millis(500)));
    }

    #[test]
    fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(!ssh_reachable("127.0.0.1", port, Duration::from_millis(200)));
    }
}
