//! IP 地址处理工具
//!
//! 客户端 IP 提取：
//! - X-Forwarded-For 第一项，其次 X-Real-IP，只接受能解析为 IP 的值
//! - 可信代理配置（trusted_proxies，支持 CIDR）
//! - 其余情况使用连接 IP

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 无法确定客户端地址时记录的值
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            // - fc00::/7 (ULA, RFC 4193)
            // - fe80::/10 (Link-local)
            // - ::1 (Loopback)
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 检查 IP 是否在可信代理列表中（单 IP 或 CIDR）
pub fn is_trusted_proxy(ip: &IpAddr, trusted_proxies: &[String]) -> bool {
    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(ip, proxy)
        } else {
            proxy.trim().parse::<IpAddr>().is_ok_and(|p| p == *ip)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.trim().split_once('/') else {
        return false;
    };

    let Ok(prefix_len): Result<u8, _> = prefix_len.parse() else {
        return false;
    };

    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u32::from_be_bytes(ip.octets());
            let net_bits = u32::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u128::from_be_bytes(ip.octets());
            let net_bits = u128::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        _ => false, // IPv4 vs IPv6 不匹配
    }
}

/// 解析单个头部值：`1.2.3.4`、`1.2.3.4:5678`、`::1`、`[::1]:80`
pub fn parse_ip_candidate(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// 从 HeaderMap 提取转发的 IP
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    // 优先 X-Forwarded-For（取第一个，即原始客户端 IP）
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(parse_ip_candidate);

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(parse_ip_candidate)
    })
}

/// 决定客户端 IP
///
/// `trusted_proxies` 为空时任何来源的转发头都被接受；
/// 非空时只接受来自列表内连接的转发头
pub fn resolve_client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[String],
) -> Option<IpAddr> {
    if !trusted_proxies.is_empty() {
        match peer {
            Some(peer_ip) if is_trusted_proxy(&peer_ip, trusted_proxies) => {}
            _ => {
                debug!("Connection from {:?} is not a trusted proxy, using peer IP", peer);
                return peer;
            }
        }
    }

    match extract_forwarded_ip_from_headers(headers) {
        Some(ip) => Some(ip),
        None => peer,
    }
}

/// 从 HttpRequest 提取真实客户端 IP，取不到时返回 [`UNKNOWN_CLIENT`]
pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> String {
    let peer = req.peer_addr().map(|addr| addr.ip());
    resolve_client_ip(peer, req.headers(), trusted_proxies)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(HeaderName::from_static(k), HeaderValue::from_static(v));
        }
        map
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&ip("10.0.0.1")));
        assert!(is_private_or_local(&ip("192.168.1.1")));
        assert!(is_private_or_local(&ip("127.0.0.1")));
        assert!(is_private_or_local(&ip("::1")));
        assert!(is_private_or_local(&ip("fd00::1")));
        assert!(is_private_or_local(&ip("fe80::1")));
        assert!(!is_private_or_local(&ip("8.8.8.8")));
        assert!(!is_private_or_local(&ip("2001:4860:4860::8888")));
    }

    #[test]
    fn test_ip_in_cidr() {
        assert!(ip_in_cidr(&ip("192.168.1.100"), "192.168.1.0/24"));
        assert!(!ip_in_cidr(&ip("192.168.2.1"), "192.168.1.0/24"));
        assert!(ip_in_cidr(&ip("2001:db8::1"), "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip("10.0.0.1"), "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip("10.0.0.1"), "10.0.0.0/40"));
        assert!(ip_in_cidr(&ip("10.0.0.1"), "0.0.0.0/0"));
    }

    #[test]
    fn test_parse_ip_candidate() {
        assert_eq!(parse_ip_candidate(" 203.0.113.9 "), Some(ip("203.0.113.9")));
        assert_eq!(parse_ip_candidate("203.0.113.9:4711"), Some(ip("203.0.113.9")));
        assert_eq!(parse_ip_candidate("[2001:db8::2]:443"), Some(ip("2001:db8::2")));
        assert_eq!(parse_ip_candidate("unknown"), None);
        assert_eq!(parse_ip_candidate(""), None);
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.9, 10.0.0.2, 10.0.0.3"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(extract_forwarded_ip_from_headers(&h), Some(ip("203.0.113.9")));
    }

    #[test]
    fn test_real_ip_used_when_forwarded_for_is_garbage() {
        let h = headers(&[
            ("x-forwarded-for", "<script>"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(extract_forwarded_ip_from_headers(&h), Some(ip("198.51.100.1")));
    }

    #[test]
    fn test_resolve_falls_back_to_peer() {
        let peer = Some(ip("192.0.2.10"));
        assert_eq!(resolve_client_ip(peer, &HeaderMap::new(), &[]), peer);

        let bogus = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(resolve_client_ip(peer, &bogus, &[]), peer);
        assert_eq!(resolve_client_ip(None, &bogus, &[]), None);
    }

    #[test]
    fn test_resolve_respects_trusted_proxies() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9")]);
        let proxies = vec!["10.0.0.0/8".to_string()];

        // 可信代理 → 使用转发头
        assert_eq!(
            resolve_client_ip(Some(ip("10.1.2.3")), &h, &proxies),
            Some(ip("203.0.113.9"))
        );
        // 非可信连接 → 忽略转发头
        assert_eq!(
            resolve_client_ip(Some(ip("198.51.100.7")), &h, &proxies),
            Some(ip("198.51.100.7"))
        );
        // 未配置 → 任何来源都接受
        assert_eq!(
            resolve_client_ip(Some(ip("198.51.100.7")), &h, &[]),
            Some(ip("203.0.113.9"))
        );
    }

    #[test]
    fn test_is_trusted_proxy_single_ip() {
        let proxies = vec!["127.0.0.1".to_string(), "::1".to_string()];
        assert!(is_trusted_proxy(&ip("127.0.0.1"), &proxies));
        assert!(is_trusted_proxy(&ip("::1"), &proxies));
        assert!(!is_trusted_proxy(&ip("127.0.0.2"), &proxies));
    }
}
