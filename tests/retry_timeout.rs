// Retry+timeout against a silent peer (spec scenario: `retries=2,
// timeout=1` against a server that never answers completes in >= 2s and
// fails with `Timeout`; the accounting variant's final retransmit carries
// `Acct-Delay-Time` updated to the elapsed seconds).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;

use rust_radius::client::AsyncClient;
use rust_radius::config::ClientConfig;
use rust_radius::dictionary::attribute::Attribute;
use rust_radius::dictionary::datatypes::DataType;
use rust_radius::dictionary::value::DecodedValue;
use rust_radius::dictionary::Dictionary;
use rust_radius::error::RadiusError;
use rust_radius::packet::{codec, PacketCode};

fn test_dict() -> Dictionary {
    let mut dict = Dictionary::new();
    dict.attributes.insert(
        "Acct-Delay-Time".to_string(),
        Attribute::new("Acct-Delay-Time", 41, DataType::Integer),
    );
    dict.attrindex.add("Acct-Delay-Time".to_string(), 41);
    dict
}

#[tokio::test]
async fn access_request_retries_twice_and_reports_timeout_after_two_seconds() {
    let dict = Arc::new(test_dict());
    let silent_port = 18898;
    let _silent_server = UdpSocket::bind(("127.0.0.1", silent_port)).await.unwrap();

    let mut config = ClientConfig::new("127.0.0.1".parse().unwrap(), "secret");
    config.auth_port = silent_port;
    config.retries = 2;
    config.timeout_secs = 1;

    let client = AsyncClient::new(config, dict.clone()).await.unwrap();
    let request = client.new_request(PacketCode::AccessRequest);

    let started = Instant::now();
    let err = client.send(request).await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_secs(2));
    match err {
        RadiusError::Timeout { attempts } => assert_eq!(attempts, 2),
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn accounting_request_retransmit_sets_acct_delay_time_to_elapsed_seconds() {
    let dict = Arc::new(test_dict());
    let silent_port = 18899;
    let silent_server = UdpSocket::bind(("127.0.0.1", silent_port)).await.unwrap();

    let mut config = ClientConfig::new("127.0.0.1".parse().unwrap(), "secret");
    config.acct_port = silent_port;
    config.retries = 2;
    config.timeout_secs = 1;

    let client = AsyncClient::new(config, dict.clone()).await.unwrap();
    let request = client.new_request(PacketCode::AccountingRequest);

    let recv_task = tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        let mut last = None;
        for _ in 0..2 {
            if let Ok((len, _)) = silent_server.recv_from(&mut buf).await {
                last = Some(buf[..len].to_vec());
            }
        }
        last
    });

    let err = client.send(request).await.unwrap_err();
    assert!(matches!(err, RadiusError::Timeout { attempts: 2 }));

    let last_wire = recv_task.await.unwrap().expect("expected two retransmits");
    let decoded = codec::decode(&last_wire, dict, b"secret".to_vec()).unwrap();
    let delay = decoded.get_one("Acct-Delay-Time").unwrap().unwrap();
    assert_eq!(delay, DecodedValue::Integer(1));
}
