use std::net::IpAddr;
use std::time::{Duration, Instant};

use hashbrown::HashMap;

use crate::net::protocol::ConnectionId;

/// Configuration for DoS protection
#[derive(Debug, Clone)]
pub struct DoSConfig {
    /// Maximum total concurrent connections
    pub max_connections_total: usize,
    /// Maximum connections per IP address
    pub max_connections_per_ip: usize,
    /// Maximum messages per window per connection
    pub max_messages_per_second: u32,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Time window for rate limiting
    pub rate_limit_window: Duration,
    /// Ban duration for repeat offenders
    pub ban_duration: Duration,
    /// Number of violations before the connection is dropped and its IP banned
    pub violations_before_ban: u32,
}

impl Default for DoSConfig {
    fn default() -> Self {
        Self {
            max_connections_total: 1000,
            max_connections_per_ip: 5,
            // Clients send input every frame
            max_messages_per_second: 200,
            max_message_size: 65536,
            rate_limit_window: Duration::from_secs(1),
            ban_duration: Duration::from_secs(300),
            violations_before_ban: 5,
        }
    }
}

impl DoSConfig {
    pub fn with_max_connections(max_connections_total: usize) -> Self {
        Self {
            max_connections_total,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct ConnectionRateLimit {
    ip: IpAddr,
    message_count: u32,
    window_start: Instant,
    violations: u32,
}

impl ConnectionRateLimit {
    fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            message_count: 0,
            window_start: Instant::now(),
            violations: 0,
        }
    }

    fn check_and_increment(&mut self, max_per_window: u32, window: Duration) -> bool {
        let now = Instant::now();

        if now.duration_since(self.window_start) >= window {
            self.window_start = now;
            self.message_count = 0;
        }

        self.message_count += 1;

        if self.message_count > max_per_window {
            self.violations += 1;
            false
        } else {
            true
        }
    }
}

#[derive(Debug)]
struct IpBan {
    banned_at: Instant,
    reason: String,
}

/// Connection caps, per-connection rate limits and temporary IP bans
pub struct DoSProtection {
    config: DoSConfig,
    ip_connections: HashMap<IpAddr, usize>,
    connection_rates: HashMap<ConnectionId, ConnectionRateLimit>,
    banned_ips: HashMap<IpAddr, IpBan>,
}

impl DoSProtection {
    pub fn new(config: DoSConfig) -> Self {
        Self {
            config,
            ip_connections: HashMap::new(),
            connection_rates: HashMap::new(),
            banned_ips: HashMap::new(),
        }
    }

    /// Check if a new connection from this IP is allowed
    pub fn check_connection(&self, ip: IpAddr) -> Result<(), DoSError> {
        if let Some(ban) = self.banned_ips.get(&ip) {
            if ban.banned_at.elapsed() < self.config.ban_duration {
                return Err(DoSError::IpBanned(ban.reason.clone()));
            }
        }

        if self.connection_rates.len() >= self.config.max_connections_total {
            return Err(DoSError::TooManyConnections);
        }

        let ip_count = self.ip_connections.get(&ip).copied().unwrap_or(0);
        if ip_count >= self.config.max_connections_per_ip {
            return Err(DoSError::TooManyConnectionsFromIp);
        }

        Ok(())
    }

    /// Admit a connection; registering the same id twice is a no-op
    pub fn register_connection(&mut self, connection_id: ConnectionId, ip: IpAddr) -> Result<(), DoSError> {
        if self.connection_rates.contains_key(&connection_id) {
            return Ok(());
        }
        self.check_connection(ip)?;

        *self.ip_connections.entry(ip).or_insert(0) += 1;
        self.connection_rates
            .insert(connection_id, ConnectionRateLimit::new(ip));
        Ok(())
    }

    pub fn unregister_connection(&mut self, connection_id: ConnectionId) {
        let Some(rate) = self.connection_rates.remove(&connection_id) else {
            return;
        };

        if let Some(count) = self.ip_connections.get_mut(&rate.ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.ip_connections.remove(&rate.ip);
            }
        }
    }

    /// Check if a message from this connection is allowed
    pub fn check_message(&mut self, connection_id: ConnectionId, size: usize) -> Result<(), DoSError> {
        if size > self.config.max_message_size {
            return Err(DoSError::MessageTooLarge(size));
        }

        if let Some(rate) = self.connection_rates.get_mut(&connection_id) {
            if rate.violations >= self.config.violations_before_ban {
                return Err(DoSError::ViolationLimitExceeded);
            }

            if !rate.check_and_increment(
                self.config.max_messages_per_second,
                self.config.rate_limit_window,
            ) {
                return Err(DoSError::RateLimitExceeded);
            }
        }

        Ok(())
    }

    /// Ban the IP behind a connection that kept exceeding its rate limit
    pub fn ban_connection_ip(&mut self, connection_id: ConnectionId, reason: &str) {
        if let Some(ip) = self.connection_rates.get(&connection_id).map(|r| r.ip) {
            self.ban_ip(ip, reason.to_string());
        }
    }

    pub fn ban_ip(&mut self, ip: IpAddr, reason: String) {
        self.banned_ips.insert(
            ip,
            IpBan {
                banned_at: Instant::now(),
                reason,
            },
        );
    }

    pub fn is_banned(&self, ip: IpAddr) -> bool {
        self.banned_ips
            .get(&ip)
            .is_some_and(|ban| ban.banned_at.elapsed() < self.config.ban_duration)
    }

    /// Drop bans that have run out; returns how many were removed
    pub fn cleanup_expired_bans(&mut self) -> usize {
        let ban_duration = self.config.ban_duration;
        let before = self.banned_ips.len();
        self.banned_ips
            .retain(|_, ban| ban.banned_at.elapsed() < ban_duration);
        before - self.banned_ips.len()
    }

    #[inline]
    pub fn connection_count(&self) -> usize {
        self.connection_rates.len()
    }

    pub fn connections_from_ip(&self, ip: IpAddr) -> usize {
        self.ip_connections.get(&ip).copied().unwrap_or(0)
    }

    pub fn violation_count(&self, connection_id: ConnectionId) -> u32 {
        self.connection_rates
            .get(&connection_id)
            .map(|r| r.violations)
            .unwrap_or(0)
    }
}

impl Default for DoSProtection {
    fn default() -> Self {
        Self::new(DoSConfig::default())
    }
}

/// Errors from DoS protection checks
#[derive(Debug, Clone, thiserror::Error)]
pub enum DoSError {
    #[error("IP is banned: {0}")]
    IpBanned(String),
    #[error("Too many total connections")]
    TooManyConnections,
    #[error("Too many connections from this IP")]
    TooManyConnectionsFromIp,
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
    #[error("Too many violations, connection terminated")]
    ViolationLimitExceeded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn test_register_and_unregister() {
        let mut dos = DoSProtection::default();
        let id = Uuid::new_v4();

        dos.register_connection(id, ip(1)).unwrap();
        assert_eq!(dos.connection_count(), 1);
        assert_eq!(dos.connections_from_ip(ip(1)), 1);

        // Re-registering is idempotent
        assert_ok!(dos.register_connection(id, ip(1)));
        assert_eq!(dos.connection_count(), 1);

        dos.unregister_connection(id);
        assert_eq!(dos.connection_count(), 0);
        assert_eq!(dos.connections_from_ip(ip(1)), 0);

        // Unknown ids are ignored
        dos.unregister_connection(Uuid::new_v4());
        assert_eq!(dos.connection_count(), 0);
    }

    #[test]
    fn test_max_connections_per_ip() {
        let config = DoSConfig {
            max_connections_per_ip: 2,
            ..Default::default()
        };
        let mut dos = DoSProtection::new(config);

        dos.register_connection(Uuid::new_v4(), ip(1)).unwrap();
        dos.register_connection(Uuid::new_v4(), ip(1)).unwrap();

        let result = dos.register_connection(Uuid::new_v4(), ip(1));
        assert!(matches!(result, Err(DoSError::TooManyConnectionsFromIp)));
        assert_ok!(dos.register_connection(Uuid::new_v4(), ip(2)));
        assert_ok!(dos.register_connection(Uuid::new_v4(), ip(2)));
        assert_err!(dos.register_connection(Uuid::new_v4(), ip(2)));
    }

    #[test]
    fn test_max_total_connections() {
        let mut dos = DoSProtection::new(DoSConfig::with_max_connections(2));

        dos.register_connection(Uuid::new_v4(), ip(1)).unwrap();
        dos.register_connection(Uuid::new_v4(), ip(2)).unwrap();

        let result = dos.register_connection(Uuid::new_v4(), ip(3));
        assert!(matches!(result, Err(DoSError::TooManyConnections)));
    }

    #[test]
    fn test_message_size() {
        let config = DoSConfig {
            max_message_size: 100,
            ..Default::default()
        };
        let mut dos = DoSProtection::new(config);
        let id = Uuid::new_v4();
        dos.register_connection(id, ip(1)).unwrap();

        assert_ok!(dos.check_message(id, 50));
        assert!(matches!(
            dos.check_message(id, 200),
            Err(DoSError::MessageTooLarge(200))
        ));
    }

    #[test]
    fn test_rate_limit_then_violation_limit() {
        let config = DoSConfig {
            max_messages_per_second: 1,
            violations_before_ban: 2,
            ..Default::default()
        };
        let mut dos = DoSProtection::new(config);
        let id = Uuid::new_v4();
        dos.register_connection(id, ip(1)).unwrap();

        dos.check_message(id, 10).unwrap();
        assert!(matches!(dos.check_message(id, 10), Err(DoSError::RateLimitExceeded)));
        assert!(matches!(dos.check_message(id, 10), Err(DoSError::RateLimitExceeded)));
        assert_eq!(dos.violation_count(id), 2);
        assert!(matches!(
            dos.check_message(id, 10),
            Err(DoSError::ViolationLimitExceeded)
        ));
    }

    #[test]
    fn test_ban_connection_ip_blocks_new_connections() {
        let mut dos = DoSProtection::default();
        let id = Uuid::new_v4();
        dos.register_connection(id, ip(1)).unwrap();

        dos.ban_connection_ip(id, "flooding");
        assert!(dos.is_banned(ip(1)));
        assert!(matches!(
            dos.register_connection(Uuid::new_v4(), ip(1)),
            Err(DoSError::IpBanned(reason)) if reason == "flooding"
        ));
        assert!(!dos.is_banned(ip(2)));
        assert_eq!(dos.cleanup_expired_bans(), 0);
    }

    #[test]
    fn test_expired_bans_are_cleaned() {
        let config = DoSConfig {
            ban_duration: Duration::ZERO,
            ..Default::default()
        };
        let mut dos = DoSProtection::new(config);
        dos.ban_ip(ip(1), "test".to_string());
        assert!(!dos.is_banned(ip(1)));
        assert_eq!(dos.cleanup_expired_bans(), 1);
    }
}
