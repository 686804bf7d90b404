//! WebRTC IP Leak Detection (network layer)
//!
//! RTCPeerConnection can discover the user's real local/public IP via STUN,
//! bypassing any VPN or proxy configured at the HTTP level. This collector
//! gathers ICE candidates against each configured STUN server and reports
//! every address a tracking script could read the same way.
//!
//! Each server gets its own peer connection and its own timeout, so a blocked
//! server can never stall the scan. A leak seen through any server marks the
//! whole layer as leaking.

use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::rc::Rc;
use std::task::{Poll, Waker};
use std::time::Duration;

use async_trait::async_trait;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    RtcConfiguration, RtcPeerConnection, RtcPeerConnectionIceEvent, RtcSessionDescriptionInit,
};

use super::js_helpers::{self, js_err};
use super::Collector;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{Layer, NetworkSignal, ProbeStatus, RawLayerSignal, StunProbe};
use crate::runtime::{with_timeout, Deadline, Stopwatch};

/// ICE candidate type, from the `typ` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Locally bound address
    Host,
    /// Address as seen from outside the NAT
    ServerReflexive,
    /// Address learned from a peer during connectivity checks
    PeerReflexive,
    /// TURN-relayed address
    Relay,
}

/// A parsed ICE candidate line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: CandidateKind,
    /// First IP literal in the line; `None` for mDNS (`*.local`) hosts
    pub address: Option<IpAddr>,
}

/// Parse a candidate line such as
/// `candidate:1 1 udp 2122260223 192.168.1.5 54321 typ host generation 0`.
///
/// Returns `None` when the line carries no recognizable `typ` marker.
pub fn parse_candidate(line: &str) -> Option<Candidate> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let kind = tokens
        .windows(2)
        .find(|pair| pair[0] == "typ")
        .and_then(|pair| match pair[1] {
            "host" => Some(CandidateKind::Host),
            "srflx" => Some(CandidateKind::ServerReflexive),
            "prflx" => Some(CandidateKind::PeerReflexive),
            "relay" => Some(CandidateKind::Relay),
            _ => None,
        })?;
    let address = tokens.iter().find_map(|token| parse_ip_literal(token));
    Some(Candidate { kind, address })
}

fn parse_ip_literal(token: &str) -> Option<IpAddr> {
    let trimmed = token.trim_start_matches('[').trim_end_matches(']');
    trimmed.parse().ok()
}

/// Whether an address is private, loopback, link-local or otherwise not
/// routable on the public internet.
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    // 10/8, 172.16/12, 192.168/16, 127/8, 169.254/16
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
}

fn is_private_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let link_local = (first & 0xffc0) == 0xfe80;
    let unique_local = (first & 0xfe00) == 0xfc00;
    ip.is_loopback() || ip.is_unspecified() || link_local || unique_local
}

/// Folds candidates from every probe into the layer signal.
#[derive(Debug, Default)]
pub struct LeakAccumulator {
    local_ips: Vec<String>,
    public_ip: Option<String>,
    probes: Vec<StunProbe>,
}

impl LeakAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Private host addresses are collected (deduplicated); the first public
    /// server-reflexive address becomes the public IP. Everything else is
    /// ignored.
    pub fn absorb(&mut self, candidate: &Candidate) {
        let Some(address) = candidate.address else {
            return;
        };
        match candidate.kind {
            CandidateKind::Host if is_private(&address) => {
                let text = address.to_string();
                if !self.local_ips.contains(&text) {
                    self.local_ips.push(text);
                }
            }
            CandidateKind::ServerReflexive if !is_private(&address) => {
                if self.public_ip.is_none() {
                    self.public_ip = Some(address.to_string());
                }
            }
            _ => {}
        }
    }

    pub fn absorb_line(&mut self, line: &str) {
        if let Some(candidate) = parse_candidate(line) {
            self.absorb(&candidate);
        }
    }

    pub fn record_probe(&mut self, probe: StunProbe) {
        self.probes.push(probe);
    }

    pub fn finish(self) -> NetworkSignal {
        let has_leak = !self.local_ips.is_empty() || self.public_ip.is_some();
        NetworkSignal {
            local_ips: self.local_ips,
            public_ip: self.public_ip,
            has_leak,
            probes: self.probes,
        }
    }
}

/// Collector for the network layer.
pub struct NetworkCollector;

#[async_trait(?Send)]
impl Collector for NetworkCollector {
    fn layer(&self) -> Layer {
        Layer::Network
    }

    async fn collect(&self, config: &ScanConfig) -> Result<RawLayerSignal> {
        let timeout = config.stun_timeout();
        let probes = config
            .stun_servers
            .iter()
            .map(|server| probe_server(server, timeout));
        let results = futures::future::join_all(probes).await;

        // join_all keeps server order, so "first public address" is stable
        let mut acc = LeakAccumulator::new();
        for (probe, candidates) in results {
            for line in &candidates {
                acc.absorb_line(line);
            }
            acc.record_probe(probe);
        }

        let signal = acc.finish();
        if signal.has_leak {
            log::info!(
                "WebRTC exposes {} local address(es), public: {:?}",
                signal.local_ips.len(),
                signal.public_ip
            );
        }
        Ok(RawLayerSignal::Network(signal))
    }
}

/// Candidate state shared with the `onicecandidate` callback.
#[derive(Default)]
struct GatherState {
    candidates: Vec<String>,
    complete: bool,
    waker: Option<Waker>,
}

/// Owns a peer connection; closes it and detaches the handler on drop.
struct PeerConnectionGuard {
    pc: RtcPeerConnection,
    _on_candidate: Closure<dyn FnMut(RtcPeerConnectionIceEvent)>,
}

impl Drop for PeerConnectionGuard {
    fn drop(&mut self) {
        self.pc.set_onicecandidate(None);
        self.pc.close();
    }
}

/// Probe one STUN server. Never fails: errors degrade to "no candidates".
async fn probe_server(server: &str, timeout: Duration) -> (StunProbe, Vec<String>) {
    let watch = Stopwatch::start();
    let probe = |status, candidates: &[String]| StunProbe {
        server: server.to_string(),
        status,
        candidates: candidates.len(),
        elapsed_ms: watch.elapsed_ms(),
    };

    if !js_helpers::has_global("RTCPeerConnection") {
        log::debug!("RTCPeerConnection unavailable, skipping {}", server);
        return (probe(ProbeStatus::Unsupported, &[]), Vec::new());
    }

    let state = Rc::new(RefCell::new(GatherState::default()));
    let guard = match open_peer_connection(server, state.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            log::warn!("STUN probe {} could not start: {}", server, e);
            return (probe(ProbeStatus::Failed, &[]), Vec::new());
        }
    };

    let status = match with_timeout(gather(&guard.pc, state.clone()), timeout).await {
        Deadline::Completed(Ok(())) => ProbeStatus::Completed,
        Deadline::Completed(Err(e)) => {
            log::warn!("STUN probe {} failed: {}", server, e);
            ProbeStatus::Failed
        }
        Deadline::Expired => {
            log::debug!("STUN probe {} timed out after {:?}", server, timeout);
            ProbeStatus::TimedOut
        }
    };
    drop(guard);

    let candidates = if status == ProbeStatus::Failed {
        Vec::new()
    } else {
        std::mem::take(&mut state.borrow_mut().candidates)
    };
    log::debug!("STUN probe {}: {:?}, {} candidate(s)", server, status, candidates.len());
    (probe(status, &candidates), candidates)
}

fn open_peer_connection(
    server: &str,
    state: Rc<RefCell<GatherState>>,
) -> Result<PeerConnectionGuard> {
    let config = RtcConfiguration::new();
    let ice_servers = js_sys::Array::new();
    let stun = js_sys::Object::new();
    js_sys::Reflect::set(&stun, &"urls".into(), &JsValue::from_str(server))
        .map_err(js_err("iceServers"))?;
    ice_servers.push(&stun);
    config.set_ice_servers(&ice_servers);

    let pc = RtcPeerConnection::new_with_configuration(&config)
        .map_err(js_err("new RTCPeerConnection"))?;

    let on_candidate = Closure::wrap(Box::new(move |event: RtcPeerConnectionIceEvent| {
        let waker = {
            let mut st = state.borrow_mut();
            match event.candidate() {
                Some(candidate) => {
                    st.candidates.push(candidate.candidate());
                    None
                }
                None => {
                    // null candidate: gathering complete
                    st.complete = true;
                    st.waker.take()
                }
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }) as Box<dyn FnMut(RtcPeerConnectionIceEvent)>);
    pc.set_onicecandidate(Some(on_candidate.as_ref().unchecked_ref()));

    Ok(PeerConnectionGuard {
        pc,
        _on_candidate: on_candidate,
    })
}

/// Force candidate gathering and wait until the browser reports completion.
async fn gather(pc: &RtcPeerConnection, state: Rc<RefCell<GatherState>>) -> Result<()> {
    // A data channel gives the offer an m-line, which starts ICE gathering
    let _channel = pc.create_data_channel("trackscan");

    let offer = JsFuture::from(pc.create_offer())
        .await
        .map_err(js_err("createOffer"))?;
    let offer: RtcSessionDescriptionInit = offer.unchecked_into();
    JsFuture::from(pc.set_local_description(&offer))
        .await
        .map_err(js_err("setLocalDescription"))?;

    futures::future::poll_fn(|cx| {
        let mut st = state.borrow_mut();
        if st.complete {
            Poll::Ready(())
        } else {
            st.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    })
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_LINE: &str =
        "candidate:842163049 1 udp 2122260223 192.168.1.5 54321 typ host generation 0";
    const SRFLX_LINE: &str = "candidate:1467250027 1 udp 1686052607 8.8.8.8 40001 typ srflx \
         raddr 192.168.1.5 rport 54321 generation 0";

    #[test]
    fn test_parse_host_candidate() {
        let c = parse_candidate(HOST_LINE).unwrap();
        assert_eq!(c.kind, CandidateKind::Host);
        assert_eq!(c.address, Some("192.168.1.5".parse().unwrap()));
    }

    #[test]
    fn test_parse_takes_first_ip_literal() {
        let c = parse_candidate(SRFLX_LINE).unwrap();
        assert_eq!(c.kind, CandidateKind::ServerReflexive);
        assert_eq!(c.address, Some("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn test_parse_mdns_and_ipv6() {
        let mdns = parse_candidate(
            "candidate:1 1 udp 2122260223 4b2a1c9e-0f5d-4e0e-9a7b-1b2c3d4e5f60.local 5000 typ host",
        )
        .unwrap();
        assert_eq!(mdns.address, None);

        let v6 = parse_candidate("candidate:2 1 udp 2122262783 fe80::1 5001 typ host").unwrap();
        assert_eq!(v6.address, Some("fe80::1".parse().unwrap()));

        assert!(parse_candidate("").is_none());
        assert!(parse_candidate("candidate:3 1 udp 1 10.0.0.1 5002 typ bogus").is_none());
    }

    #[test]
    fn test_private_ranges() {
        for ip in [
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.0.1",
            "127.0.0.1",
            "169.254.10.10",
            "::1",
            "fe80::abcd",
            "fd12:3456::1",
        ] {
            assert!(is_private(&ip.parse().unwrap()), "{} should be private", ip);
        }
        for ip in ["8.8.8.8", "172.32.0.1", "1.1.1.1", "2001:4860:4860::8888"] {
            assert!(!is_private(&ip.parse().unwrap()), "{} should be public", ip);
        }
    }

    #[test]
    fn test_host_candidate_is_local_leak() {
        let mut acc = LeakAccumulator::new();
        acc.absorb_line(HOST_LINE);
        let signal = acc.finish();
        assert_eq!(signal.local_ips, vec!["192.168.1.5"]);
        assert_eq!(signal.public_ip, None);
        assert!(signal.has_leak);
    }

    #[test]
    fn test_srflx_candidate_sets_public_ip() {
        let mut acc = LeakAccumulator::new();
        acc.absorb_line(SRFLX_LINE);
        let signal = acc.finish();
        assert_eq!(signal.public_ip.as_deref(), Some("8.8.8.8"));
        assert!(signal.local_ips.is_empty());
        assert!(signal.has_leak);
    }

    #[test]
    fn test_dedup_and_first_public_wins() {
        let mut acc = LeakAccumulator::new();
        acc.absorb_line(HOST_LINE);
        acc.absorb_line(HOST_LINE);
        acc.absorb_line(SRFLX_LINE);
        acc.absorb_line("candidate:9 1 udp 1 1.1.1.1 40002 typ srflx");
        // relay and public host addresses are not collected
        acc.absorb_line("candidate:10 1 udp 1 10.9.9.9 3478 typ relay");
        acc.absorb_line("candidate:11 1 udp 1 93.184.216.34 3478 typ host");
        let signal = acc.finish();
        assert_eq!(signal.local_ips, vec!["192.168.1.5"]);
        assert_eq!(signal.public_ip.as_deref(), Some("8.8.8.8"));
    }

    #[test]
    fn test_no_candidates_is_not_a_leak() {
        let mut acc = LeakAccumulator::new();
        acc.record_probe(StunProbe {
            server: "stun:example.invalid:3478".into(),
            status: ProbeStatus::Unsupported,
            candidates: 0,
            elapsed_ms: 0.0,
        });
        let signal = acc.finish();
        assert!(!signal.has_leak);
        assert_eq!(signal.probes.len(), 1);
    }
}
