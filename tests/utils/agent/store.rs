use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use serde_json::Value;
use vc_exchange::Exchange;
use vc_exchange::provider::{Connection, ConnectionState};

#[derive(Clone, Debug, Default)]
pub struct ExchangeTable {
    records: Arc<Mutex<HashMap<String, Exchange>>>,
}

impl ExchangeTable {
    pub fn put(&self, exchange: &Exchange) {
        self.records.lock().expect("should lock").insert(exchange.id.clone(), exchange.clone());
    }

    pub fn get(&self, exchange_id: &str) -> Option<Exchange> {
        self.records.lock().expect("should lock").get(exchange_id).cloned()
    }

    pub fn by_thread(&self, thread_id: &str) -> Vec<Exchange> {
        let records = self.records.lock().expect("should lock");
        records.values().filter(|e| e.thread_id == thread_id).cloned().collect()
    }

    pub fn all(&self) -> Vec<Exchange> {
        self.records.lock().expect("should lock").values().cloned().collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MessageTable {
    messages: Arc<Mutex<HashMap<(String, String), Value>>>,
}

impl MessageTable {
    pub fn save(&self, exchange_id: &str, message_type: &str, message: Value) {
        self.messages
            .lock()
            .expect("should lock")
            .insert((exchange_id.to_string(), message_type.to_string()), message);
    }

    pub fn find(&self, exchange_id: &str, message_type: &str) -> Option<Value> {
        let key = (exchange_id.to_string(), message_type.to_string());
        self.messages.lock().expect("should lock").get(&key).cloned()
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionTable {
    connections: Arc<Mutex<HashMap<String, Connection>>>,
}

impl ConnectionTable {
    pub fn new(connection: Connection) -> Self {
        let connections = HashMap::from([(connection.id.clone(), connection)]);
        Self {
            connections: Arc::new(Mutex::new(connections)),
        }
    }

    pub fn add(&self, connection: Connection) {
        self.connections.lock().expect("should lock").insert(connection.id.clone(), connection);
    }

    pub fn get(&self, connection_id: &str) -> Result<Connection> {
        self.connections
            .lock()
            .expect("should lock")
            .get(connection_id)
            .cloned()
            .ok_or_else(|| anyhow!("connection {connection_id} not found"))
    }
}

pub fn complete(id: &str, did: &str, their_did: &str) -> Connection {
    Connection {
        id: id.into(),
        did: did.into(),
        their_did: their_did.into(),
        state: ConnectionState::Complete,
    }
}
