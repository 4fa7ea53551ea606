//! audit record of one invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Access;

/// one record per invocation, written on open and again on every update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLog {
    /// unique id, also the name of the session recording.
    pub uniq_id: Uuid,

    /// local account that invoked the bastion.
    pub local_username: String,

    /// raw arguments, space joined.
    pub arguments: String,

    /// when the invocation started.
    pub session_start_date: DateTime<Utc>,

    /// when the invocation ended, if it has.
    pub session_end_date: Option<DateTime<Utc>>,

    /// address of the connecting client.
    pub ip_from: String,

    /// port of the connecting client.
    pub port_from: String,

    /// address the bastion was reached on.
    pub bastion_ip: String,

    /// port the bastion was reached on.
    pub bastion_port: String,

    /// operation that was dispatched.
    pub command: String,

    /// free text note.
    pub comment: String,

    /// destination host.
    pub host_to: String,

    /// destination port, 0 when none.
    pub port_to: u16,

    /// destination login.
    pub user_to: String,

    /// whether the invocation was allowed through the gate.
    pub allowed: bool,
}

impl SessionLog {
    /// open a log for `username` running `arguments`.
    ///
    /// `ssh_connection` is the `SSH_CONNECTION` value when invoked through sshd:
    /// `<client ip> <client port> <server ip> <server port>`.
    pub fn open(username: impl Into<String>, arguments: &[String], ssh_connection: Option<&str>) -> Self {
        let mut log = Self {
            uniq_id: Uuid::new_v4(),
            local_username: username.into(),
            arguments: arguments.join(" "),
            session_start_date: Utc::now(),
            session_end_date: None,
            ip_from: String::new(),
            port_from: String::new(),
            bastion_ip: String::new(),
            bastion_port: String::new(),
            command: String::new(),
            comment: String::new(),
            host_to: String::new(),
            port_to: 0,
            user_to: String::new(),
            allowed: false,
        };
        if let Some(conn) = ssh_connection {
            let parts: Vec<&str> = conn.split_whitespace().collect();
            if let [ip_from, port_from, bastion_ip, bastion_port, ..] = parts.as_slice() {
                log.ip_from = ip_from.to_string();
                log.port_from = port_from.to_string();
                log.bastion_ip = bastion_ip.to_string();
                log.bastion_port = bastion_port.to_string();
            }
        }
        log
    }

    /// record the destination the invocation resolved to.
    pub fn set_target(&mut self, access: &Access) {
        self.set_destination(&access.host, &access.user, access.port);
    }

    /// record a destination as the caller asked for it.
    pub fn set_destination(&mut self, host: &str, user: &str, port: u16) {
        self.host_to = host.to_string();
        self.user_to = user.to_string();
        self.port_to = port;
    }

    /// mark the invocation finished.
    pub fn close(&mut self) {
        self.session_end_date = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_parses_ssh_connection() {
        let args = vec!["self".to_string(), "access".to_string(), "list".to_string()];
        let log = SessionLog::open("alice", &args, Some("192.0.2.7 51234 10.0.0.1 22"));
        assert_eq!(log.arguments, "self access list");
        assert_eq!(log.ip_from, "192.0.2.7");
        assert_eq!(log.port_from, "51234");
        assert_eq!(log.bastion_ip, "10.0.0.1");
        assert_eq!(log.bastion_port, "22");
        assert!(!log.allowed);
        assert!(log.session_end_date.is_none());
    }

    #[test]
    fn test_open_ignores_short_ssh_connection() {
        let log = SessionLog::open("alice", &[], Some("192.0.2.7"));
        assert!(log.ip_from.is_empty());
    }

    #[test]
    fn test_json_round_trip_keeps_target() {
        let mut log = SessionLog::open("alice", &[], None);
        log.set_target(&Access {
            uniq_id: String::new(),
            host: "example.com".into(),
            prefix: None,
            alias: None,
            user: "root".into(),
            port: 22,
            comment: String::new(),
            ip: None,
        });
        log.close();
        let back: SessionLog = serde_json::from_str(&serde_json::to_string(&log).unwrap()).unwrap();
        assert_eq!(back, log);
    }
}
