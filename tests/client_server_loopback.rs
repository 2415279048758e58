// End-to-end: a real `Server` listening on loopback, a real `AsyncClient`
// sending an Access-Request and getting back an Access-Accept built by a
// test `RequestHandler`. Exercises encode/decode, authenticator
// computation, and id correlation together rather than in isolation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use rust_radius::client::AsyncClient;
use rust_radius::config::{ClientConfig, RemoteHostConfig, ServerConfig};
use rust_radius::dictionary::attribute::Attribute;
use rust_radius::dictionary::datatypes::DataType;
use rust_radius::dictionary::value::DecodedValue;
use rust_radius::dictionary::Dictionary;
use rust_radius::error::Result;
use rust_radius::packet::{Packet, PacketCode};
use rust_radius::server::{RequestHandler, Server};

fn test_dict() -> Dictionary {
    let mut dict = Dictionary::new();
    dict.attributes.insert("User-Name".to_string(), Attribute::new("User-Name", 1, DataType::String));
    dict.attrindex.add("User-Name".to_string(), 1);
    dict
}

struct EchoUserNameHandler;

#[async_trait]
impl RequestHandler for EchoUserNameHandler {
    async fn handle(&self, request: Packet, _peer: SocketAddr) -> Result<Packet> {
        let mut reply = Packet::new(PacketCode::AccessAccept.as_u8(), request.dict.clone(), request.secret.clone());
        if let Some(name) = request.get_one("User-Name")? {
            reply.add("User-Name", name)?;
        }
        Ok(reply)
    }
}

#[tokio::test]
async fn access_request_round_trips_through_a_real_udp_server() {
    let dict = Arc::new(test_dict());
    let secret = "loopback-test-secret";
    let auth_port = 18812;

    let mut server_config = ServerConfig::default();
    server_config.bind_addresses = vec!["127.0.0.1".parse().unwrap()];
    server_config.auth_port = auth_port;
    server_config.acct_enabled = false;
    server_config.coa_enabled = false;
    server_config.hosts = vec![RemoteHostConfig {
        name: "test-client".to_string(),
        address: "127.0.0.1".parse().unwrap(),
        secret: secret.to_string(),
        auth_port,
        acct_port: server_config.acct_port,
        coa_port: server_config.coa_port,
    }];

    let server = Server::new(server_config, dict.clone(), Arc::new(EchoUserNameHandler));
    let server_task = tokio::spawn(server.run());

    // Give the listener a moment to bind before the client sends.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client_config = ClientConfig::new("127.0.0.1".parse().unwrap(), secret);
    client_config.auth_port = auth_port;

    let client = AsyncClient::new(client_config, dict.clone()).await.unwrap();
    let mut request = client.new_request(PacketCode::AccessRequest);
    request.add("User-Name", DecodedValue::String("alice".into())).unwrap();

    let reply = client.send(request).await.unwrap();
    assert_eq!(reply.packet_code(), PacketCode::AccessAccept);
    assert_eq!(reply.get_one("User-Name").unwrap().unwrap(), DecodedValue::String("alice".into()));

    server_task.abort();
}
